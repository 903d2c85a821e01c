//! Evaluation pipeline
//!
//! Runs lifecycle hooks, loads the dataset exactly once, evaluates every
//! restraint against the shared bundle and assembles the report:
//! - Sequential or parallel restraint evaluation
//! - Results kept in configuration order regardless of execution mode
//! - All-or-nothing: the first failing restraint (in configuration order) aborts the run

use crate::restraint::Restraint;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use simet_core::{
    DatasetSource, Error, LifecycleHook, LoadedDataset, MetricResult, Report, Result,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

/// How restraints are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One after another on the calling task
    Sequential,

    /// Concurrently on the blocking thread pool
    #[default]
    Parallel,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(format!(
                "unknown execution mode '{other}' (expected 'sequential' or 'parallel')"
            )),
        }
    }
}

/// Orchestrates one evaluation run
#[derive(Clone)]
pub struct Pipeline {
    loader: Arc<dyn DatasetSource>,
    restraints: Vec<Arc<dyn Restraint>>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
    execution: ExecutionMode,
    max_concurrency: usize,
}

impl Pipeline {
    /// Create a pipeline over a loader and an ordered set of restraints
    pub fn new(loader: Arc<dyn DatasetSource>, restraints: Vec<Arc<dyn Restraint>>) -> Self {
        Self {
            loader,
            restraints,
            hooks: Vec::new(),
            execution: ExecutionMode::default(),
            max_concurrency: num_cpus::get().max(1),
        }
    }

    /// Add a hook run once at the start of every run
    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Set the execution mode
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Cap the number of restraints evaluated at once in parallel mode
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Number of configured restraints
    pub fn restraint_count(&self) -> usize {
        self.restraints.len()
    }

    /// Names of the configured restraints, in order
    pub fn restraint_names(&self) -> Vec<&str> {
        self.restraints.iter().map(|r| r.name()).collect()
    }

    pub fn execution(&self) -> ExecutionMode {
        self.execution
    }

    /// Execute the run and build the report
    pub async fn run(&self) -> Result<Report> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        for hook in &self.hooks {
            hook.on_start()
                .map_err(|e| e.in_stage(format!("hook:{}", hook.name())))?;
        }

        info!(
            %run_id,
            restraints = self.restraints.len(),
            execution = ?self.execution,
            "Starting evaluation run"
        );

        let data = self.loader.load().await.map_err(|e| e.in_stage("load"))?;
        info!(
            real = data.real_embeddings().rows(),
            synth = data.synth_embeddings().rows(),
            dim = data.real_embeddings().dim(),
            "Dataset loaded"
        );
        let data = Arc::new(data);

        let results = match self.execution {
            ExecutionMode::Sequential => self.evaluate_sequential(&data)?,
            ExecutionMode::Parallel => self.evaluate_parallel(data).await?,
        };

        let report = Report::new(
            run_id,
            started_at,
            start.elapsed().as_millis() as u64,
            results,
        );

        info!(
            %run_id,
            passed = report.passed,
            failures = report.failures().count(),
            duration_ms = report.duration_ms,
            "Evaluation run complete"
        );
        Ok(report)
    }

    fn evaluate_sequential(&self, data: &LoadedDataset) -> Result<Vec<MetricResult>> {
        self.restraints
            .iter()
            .map(|restraint| evaluate_one(restraint.as_ref(), data))
            .collect()
    }

    async fn evaluate_parallel(&self, data: Arc<LoadedDataset>) -> Result<Vec<MetricResult>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let futures: Vec<_> = self
            .restraints
            .iter()
            .map(|restraint| {
                let restraint = Arc::clone(restraint);
                let data = Arc::clone(&data);
                let semaphore = Arc::clone(&semaphore);

                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::internal(format!("restraint scheduler closed: {e}")))?;

                    let name = restraint.name().to_string();
                    tokio::task::spawn_blocking(move || evaluate_one(restraint.as_ref(), &data))
                        .await
                        .map_err(|e| {
                            Error::internal(format!("restraint task failed: {e}")).in_stage(name)
                        })?
                }
            })
            .collect();

        // join_all keeps input order, so collecting stops at the first error in configuration order
        join_all(futures).await.into_iter().collect()
    }
}

/// Evaluate one restraint, recording latency and outcome
fn evaluate_one(restraint: &dyn Restraint, data: &LoadedDataset) -> Result<MetricResult> {
    let start = Instant::now();
    let outcome = restraint.evaluate(data);
    let latency_us = start.elapsed().as_micros() as u64;

    let name = restraint.name().to_string();
    metrics::histogram!("simet_restraint_latency_us", "restraint" => name.clone())
        .record(latency_us as f64);

    match &outcome {
        Ok(result) => {
            let label = if result.passed { "pass" } else { "fail" };
            metrics::counter!(
                "simet_restraint_evaluations_total",
                "restraint" => name.clone(),
                "outcome" => label
            )
            .increment(1);
            info!(
                restraint = %name,
                value = %result.value,
                bound = %result.bound,
                passed = result.passed,
                latency_us,
                "Restraint evaluated"
            );
        }
        Err(e) => {
            metrics::counter!(
                "simet_restraint_evaluations_total",
                "restraint" => name.clone(),
                "outcome" => "error"
            )
            .increment(1);
            warn!(restraint = %name, error = %e, "Restraint failed");
        }
    }

    outcome.map_err(|e| e.in_stage(name))
}

/// Builder for constructing pipelines fluently
pub struct PipelineBuilder {
    loader: Option<Arc<dyn DatasetSource>>,
    restraints: Vec<Arc<dyn Restraint>>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
    execution: ExecutionMode,
    max_concurrency: Option<usize>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            loader: None,
            restraints: Vec::new(),
            hooks: Vec::new(),
            execution: ExecutionMode::default(),
            max_concurrency: None,
        }
    }

    /// Set the dataset loader
    pub fn loader(mut self, loader: impl DatasetSource + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Set a shared dataset loader
    pub fn shared_loader(mut self, loader: Arc<dyn DatasetSource>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Append a restraint
    pub fn restraint(mut self, restraint: impl Restraint + 'static) -> Self {
        self.restraints.push(Arc::new(restraint));
        self
    }

    /// Append already shared restraints
    pub fn restraints(mut self, restraints: impl IntoIterator<Item = Arc<dyn Restraint>>) -> Self {
        self.restraints.extend(restraints);
        self
    }

    /// Append a lifecycle hook
    pub fn hook(mut self, hook: impl LifecycleHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Set the execution mode
    pub fn execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Cap parallel restraint evaluations
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let loader = self
            .loader
            .ok_or_else(|| Error::config("pipeline requires a dataset loader"))?;

        let mut pipeline = Pipeline::new(loader, self.restraints).with_execution(self.execution);
        if let Some(max) = self.max_concurrency {
            pipeline = pipeline.with_max_concurrency(max);
        }
        for hook in self.hooks {
            pipeline = pipeline.with_hook(hook);
        }
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
