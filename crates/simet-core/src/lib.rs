//! simet Core
//!
//! Core types, traits, and utilities shared across simet components.
//!
//! This crate provides:
//! - The error type and result alias used by every crate
//! - Embedding matrices, labelled downstream sets and the loaded dataset bundle
//! - Metric values, acceptance bounds, metric results and the run report
//! - Process-wide seeding and start-of-run lifecycle hooks

pub mod dataset;
pub mod error;
pub mod hooks;
pub mod seed;
pub mod types;

pub use dataset::{DatasetSource, Embeddings, LabeledSet, LoadedDataset};
pub use error::{Error, Result};
pub use hooks::{LifecycleHook, SeedingHook};
pub use types::{Bound, MetricResult, MetricValue, Report, Shape};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dataset::{DatasetSource, Embeddings, LabeledSet, LoadedDataset};
    pub use crate::error::{Error, Result};
    pub use crate::types::{Bound, MetricResult, MetricValue, Report};
}
