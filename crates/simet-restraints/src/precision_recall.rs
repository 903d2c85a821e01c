//! Manifold precision/recall restraint
//!
//! Each real embedding defines a hypersphere reaching its k-th nearest real
//! neighbour; precision is the fraction of synthetic embeddings inside the
//! union of those spheres. Recall swaps the roles of the two populations.
//! Both directions use the same `k`.

use crate::neighbors::{kth_neighbor_radii, manifold_coverage};
use crate::restraint::{Restraint, RestraintKind};
use simet_core::{Bound, Embeddings, Error, LoadedDataset, MetricResult, MetricValue, Result};
use tracing::debug;

/// Default neighbourhood size
pub const DEFAULT_K: usize = 10;

/// Manifold precision and recall of `synth` with respect to `real`
pub fn precision_recall(real: &Embeddings, synth: &Embeddings, k: usize) -> Result<(f64, f64)> {
    if real.dim() != synth.dim() {
        return Err(Error::shape_mismatch(
            "precision/recall populations",
            real.dim(),
            synth.dim(),
        ));
    }

    let real_radii = manifold_radii(real, k, "real")?;
    let synth_radii = manifold_radii(synth, k, "synthetic")?;

    let precision = manifold_coverage(real, &real_radii, synth)?;
    let recall = manifold_coverage(synth, &synth_radii, real)?;

    debug!(k, precision, recall, "precision/recall computed");
    Ok((precision, recall))
}

/// Radii of one population, naming it when it has fewer than `k + 1` points
fn manifold_radii(points: &Embeddings, k: usize, population: &str) -> Result<Vec<f64>> {
    if k > 0 && points.rows() <= k {
        return Err(Error::insufficient_samples(
            format!("{population} {k}-nearest-neighbour radii"),
            k + 1,
            points.rows(),
        ));
    }
    kth_neighbor_radii(points, k)
}

/// Restraint on manifold precision and recall, one interval per dimension
#[derive(Debug, Clone)]
pub struct PrecisionRecallRestraint {
    name: String,
    bound: Bound,
    k: usize,
}

impl PrecisionRecallRestraint {
    /// Create a restraint with the default `k`
    ///
    /// Bounds are `(precision, recall)` pairs.
    pub fn new(lower_bound: (f64, f64), upper_bound: (f64, f64)) -> Result<Self> {
        Self::with_k(lower_bound, upper_bound, DEFAULT_K)
    }

    /// Create a restraint with an explicit neighbourhood size (`k ≥ 1`)
    pub fn with_k(lower_bound: (f64, f64), upper_bound: (f64, f64), k: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::config("precision/recall k must be at least 1"));
        }
        Ok(Self {
            name: RestraintKind::PrecisionRecall.default_name().to_string(),
            bound: Bound::pair(lower_bound, upper_bound)?,
            k,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

impl Restraint for PrecisionRecallRestraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn bound(&self) -> &Bound {
        &self.bound
    }

    fn evaluate(&self, data: &LoadedDataset) -> Result<MetricResult> {
        let (precision, recall) =
            precision_recall(data.real_embeddings(), data.synth_embeddings(), self.k)?;
        MetricResult::check(&self.name, MetricValue::Pair(precision, recall), self.bound)
    }
}
