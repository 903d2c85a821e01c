//! Evaluation run configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use simet_core::seed::DEFAULT_SEED;
use simet_core::SeedingHook;
use simet_data::LoaderSpec;
use simet_restraints::{
    build_restraints, ExecutionMode, Pipeline, PipelineBuilder, Restraint, RestraintSpec,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One evaluation run, as read from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Process-wide seed
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Restraint scheduling
    #[serde(default)]
    pub execution: ExecutionMode,

    /// Cap on restraints evaluated at once in parallel mode
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Directory for a run log file, in addition to stderr
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Providers, transforms and feature extractor
    #[serde(flatten)]
    pub loader: LoaderSpec,

    /// Restraints, evaluated and reported in this order
    #[serde(default)]
    pub restraints: Vec<RestraintSpec>,

    /// Directory relative data paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl EvaluationConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Parse configuration from YAML text; paths resolve against the working directory
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Apply CLI overrides
    pub fn apply_overrides(
        &mut self,
        seed: Option<u64>,
        execution: Option<ExecutionMode>,
        log_dir: Option<PathBuf>,
    ) {
        if let Some(seed) = seed {
            self.seed = seed;
        }
        if let Some(execution) = execution {
            self.execution = execution;
        }
        if log_dir.is_some() {
            self.log_dir = log_dir;
        }
    }

    /// Log directory, relative paths resolved against the config file
    pub fn resolved_log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| self.base_dir.join(dir))
    }

    /// Check the loader settings and build the restraints
    ///
    /// Touches neither sample data nor extractor weights.
    pub fn validate(&self) -> simet_core::Result<Vec<Arc<dyn Restraint>>> {
        self.loader.validate()?;
        build_restraints(&self.restraints)
    }

    /// Build the pipeline; extractor weights are loaded, sample data is not
    pub fn build_pipeline(&self) -> simet_core::Result<Pipeline> {
        let loader = self.loader.build(&self.base_dir)?;
        let restraints = build_restraints(&self.restraints)?;

        let mut builder = PipelineBuilder::new()
            .loader(loader)
            .restraints(restraints)
            .hook(SeedingHook::new(self.seed))
            .execution(self.execution);
        if let Some(max) = self.max_concurrency {
            builder = builder.max_concurrency(max);
        }
        builder.build()
    }
}
