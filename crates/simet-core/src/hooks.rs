//! Lifecycle hooks invoked once at the start of a pipeline run

use crate::error::Result;
use crate::seed;

/// Start-of-run hook (logging setup, seeding, ...)
pub trait LifecycleHook: Send + Sync {
    /// Hook name, for logging
    fn name(&self) -> &str;

    /// Called once before the dataset is loaded
    fn on_start(&self) -> Result<()>;
}

/// Sets the process-wide seed
#[derive(Debug, Clone, Copy)]
pub struct SeedingHook {
    seed: u64,
}

impl SeedingHook {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SeedingHook {
    fn default() -> Self {
        Self::new(seed::DEFAULT_SEED)
    }
}

impl LifecycleHook for SeedingHook {
    fn name(&self) -> &str {
        "seeding"
    }

    fn on_start(&self) -> Result<()> {
        seed::set_global_seed(self.seed);
        Ok(())
    }
}
