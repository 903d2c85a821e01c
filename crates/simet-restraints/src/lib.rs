//! simet Restraints
//!
//! Bound-checked metrics comparing real and synthetic data, and the pipeline
//! that evaluates them.
//!
//! Restraints fall into two families:
//! - Fidelity: Fréchet distance and manifold precision/recall on embeddings
//! - Detectability and utility: real-vs-synthetic ROC-AUC, and the TRTS/TSTR
//!   accuracies of a downstream classifier
//!
//! Every restraint is a pure function of the loaded dataset, so the pipeline
//! may evaluate them concurrently without changing results.

pub mod classifier;
pub mod config;
pub mod fid;
pub mod linalg;
pub mod neighbors;
pub mod pipeline;
pub mod precision_recall;
pub mod restraint;
pub mod roc_auc;
pub mod split;
pub mod utility;

pub use classifier::{SoftmaxClassifier, TrainParams};
pub use config::{build_restraints, BoundValue, RestraintSpec};
pub use fid::{frechet_distance, FidRestraint};
pub use pipeline::{ExecutionMode, Pipeline, PipelineBuilder};
pub use precision_recall::{precision_recall, PrecisionRecallRestraint};
pub use restraint::{Restraint, RestraintKind};
pub use roc_auc::{roc_auc, RocAucRestraint};
pub use utility::{train_and_score, SampleTrtsRestraint, SampleTstrRestraint, UtilityDirection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::fid::FidRestraint;
    pub use crate::pipeline::{ExecutionMode, Pipeline, PipelineBuilder};
    pub use crate::precision_recall::PrecisionRecallRestraint;
    pub use crate::restraint::Restraint;
    pub use crate::roc_auc::RocAucRestraint;
    pub use crate::utility::{SampleTrtsRestraint, SampleTstrRestraint};
}
