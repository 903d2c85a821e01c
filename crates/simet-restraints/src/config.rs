//! Configuration specs for restraints (for YAML/config files)

use crate::classifier::TrainParams;
use crate::fid::FidRestraint;
use crate::precision_recall::{PrecisionRecallRestraint, DEFAULT_K};
use crate::restraint::{Restraint, RestraintKind};
use crate::roc_auc::{RocAucRestraint, DEFAULT_TEST_FRACTION};
use crate::utility::{SampleTrtsRestraint, SampleTstrRestraint};
use serde::{Deserialize, Serialize};
use simet_core::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// A bound endpoint as written in config: a number or a `[a, b]` pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundValue {
    Scalar(f64),
    Pair((f64, f64)),
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Pair((a, b)) => write!(f, "[{a}, {b}]"),
        }
    }
}

/// Restraint specification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestraintSpec {
    /// Fréchet distance between embedding populations
    Fid {
        lower_bound: BoundValue,
        upper_bound: BoundValue,
    },

    /// Manifold precision and recall
    PrecisionRecall {
        lower_bound: BoundValue,
        upper_bound: BoundValue,
        #[serde(default = "default_k")]
        k: usize,
    },

    /// Real-vs-synthetic classifier ROC-AUC
    RocAuc {
        lower_bound: BoundValue,
        upper_bound: BoundValue,
        #[serde(default = "default_test_fraction")]
        test_fraction: f64,
        #[serde(default)]
        training: TrainParams,
        /// Fixed split seed; derived from the global seed when absent
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Train on real, test on synthetic
    #[serde(alias = "sample_trts")]
    Trts {
        lower_bound: BoundValue,
        upper_bound: BoundValue,
        #[serde(default)]
        training: TrainParams,
    },

    /// Train on synthetic, test on real
    #[serde(alias = "sample_tstr")]
    Tstr {
        lower_bound: BoundValue,
        upper_bound: BoundValue,
        #[serde(default)]
        training: TrainParams,
    },
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_test_fraction() -> f64 {
    DEFAULT_TEST_FRACTION
}

impl RestraintSpec {
    /// Kind of restraint this spec builds
    pub fn kind(&self) -> RestraintKind {
        match self {
            Self::Fid { .. } => RestraintKind::Fid,
            Self::PrecisionRecall { .. } => RestraintKind::PrecisionRecall,
            Self::RocAuc { .. } => RestraintKind::RocAuc,
            Self::Trts { .. } => RestraintKind::Trts,
            Self::Tstr { .. } => RestraintKind::Tstr,
        }
    }

    /// Configured `(lower, upper)` bound endpoints
    pub fn bounds(&self) -> (BoundValue, BoundValue) {
        match self {
            Self::Fid {
                lower_bound,
                upper_bound,
            }
            | Self::PrecisionRecall {
                lower_bound,
                upper_bound,
                ..
            }
            | Self::RocAuc {
                lower_bound,
                upper_bound,
                ..
            }
            | Self::Trts {
                lower_bound,
                upper_bound,
                ..
            }
            | Self::Tstr {
                lower_bound,
                upper_bound,
                ..
            } => (*lower_bound, *upper_bound),
        }
    }

    /// Construct the restraint, checking bound shapes against the metric
    pub fn build(&self) -> Result<Arc<dyn Restraint>> {
        let kind = self.kind();
        let restraint: Arc<dyn Restraint> = match self {
            Self::Fid {
                lower_bound,
                upper_bound,
            } => {
                let (lower, upper) = scalar_bounds(kind, lower_bound, upper_bound)?;
                Arc::new(FidRestraint::new(lower, upper)?)
            }
            Self::PrecisionRecall {
                lower_bound,
                upper_bound,
                k,
            } => {
                let (lower, upper) = pair_bounds(kind, lower_bound, upper_bound)?;
                Arc::new(PrecisionRecallRestraint::with_k(lower, upper, *k)?)
            }
            Self::RocAuc {
                lower_bound,
                upper_bound,
                test_fraction,
                training,
                seed,
            } => {
                let (lower, upper) = scalar_bounds(kind, lower_bound, upper_bound)?;
                let mut restraint = RocAucRestraint::new(lower, upper)?
                    .with_test_fraction(*test_fraction)?
                    .with_params(*training)?;
                if let Some(seed) = seed {
                    restraint = restraint.with_seed(*seed);
                }
                Arc::new(restraint)
            }
            Self::Trts {
                lower_bound,
                upper_bound,
                training,
            } => {
                let (lower, upper) = scalar_bounds(kind, lower_bound, upper_bound)?;
                Arc::new(SampleTrtsRestraint::new(lower, upper)?.with_params(*training)?)
            }
            Self::Tstr {
                lower_bound,
                upper_bound,
                training,
            } => {
                let (lower, upper) = scalar_bounds(kind, lower_bound, upper_bound)?;
                Arc::new(SampleTstrRestraint::new(lower, upper)?.with_params(*training)?)
            }
        };
        Ok(restraint)
    }
}

/// Build every spec in order, failing on the first invalid one
pub fn build_restraints(specs: &[RestraintSpec]) -> Result<Vec<Arc<dyn Restraint>>> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            spec.build().map_err(|e| {
                Error::config(format!(
                    "restraint #{} ({}): {e}",
                    i + 1,
                    spec.kind().default_name()
                ))
            })
        })
        .collect()
}

fn scalar_bounds(kind: RestraintKind, lower: &BoundValue, upper: &BoundValue) -> Result<(f64, f64)> {
    match (lower, upper) {
        (BoundValue::Scalar(l), BoundValue::Scalar(u)) => Ok((*l, *u)),
        _ => Err(Error::config(format!(
            "{} takes scalar bounds, got lower={lower} upper={upper}",
            kind.default_name()
        ))),
    }
}

fn pair_bounds(
    kind: RestraintKind,
    lower: &BoundValue,
    upper: &BoundValue,
) -> Result<((f64, f64), (f64, f64))> {
    match (lower, upper) {
        (BoundValue::Pair(l), BoundValue::Pair(u)) => Ok((*l, *u)),
        _ => Err(Error::config(format!(
            "{} takes [a, b] pair bounds, got lower={lower} upper={upper}",
            kind.default_name()
        ))),
    }
}
