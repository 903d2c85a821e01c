//! Restraint trait and common types

use simet_core::{Bound, LoadedDataset, MetricResult, Result};

/// A bound-checked metric evaluator
///
/// Implementations are pure functions of the loaded dataset: they hold only
/// their configuration and never mutate shared data, so evaluation order and
/// concurrency do not affect results.
pub trait Restraint: Send + Sync {
    /// Metric name reported in results
    fn name(&self) -> &str;

    /// Acceptance interval
    fn bound(&self) -> &Bound;

    /// Compute the metric and check it against the bound
    fn evaluate(&self, data: &LoadedDataset) -> Result<MetricResult>;
}

/// Kind of metric a restraint computes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestraintKind {
    /// Fréchet distance between Gaussian fits
    Fid,
    /// Manifold precision and recall
    PrecisionRecall,
    /// Real-vs-synthetic classifier ROC-AUC
    RocAuc,
    /// Train on real, test on synthetic
    Trts,
    /// Train on synthetic, test on real
    Tstr,
}

impl RestraintKind {
    /// Default metric name
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Fid => "fid",
            Self::PrecisionRecall => "precision_recall",
            Self::RocAuc => "roc_auc",
            Self::Trts => "trts",
            Self::Tstr => "tstr",
        }
    }

    /// Whether the metric value is higher-is-better
    pub fn higher_is_better(&self) -> bool {
        match self {
            Self::Fid | Self::RocAuc => false,
            Self::PrecisionRecall | Self::Trts | Self::Tstr => true,
        }
    }
}
