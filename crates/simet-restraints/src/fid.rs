//! Fréchet Inception Distance restraint
//!
//! Fits a Gaussian (mean, covariance) to each embedding population and
//! computes
//!
//! ```text
//! d² = ‖μ_r − μ_s‖² + tr(Σ_r + Σ_s − 2·(Σ_r·Σ_s)^{1/2})
//! ```
//!
//! The cross term is evaluated as `tr((S·Σ_s·S)^{1/2})` with `S = Σ_r^{1/2}`,
//! which has the same eigenvalues as `Σ_r·Σ_s` but is symmetric, so the
//! decomposition never leaves the reals.

use crate::linalg::{matmul, sqrt_psd, squared_distance, trace, trace_sqrt_psd};
use crate::restraint::{Restraint, RestraintKind};
use simet_core::{Bound, Embeddings, Error, LoadedDataset, MetricResult, MetricValue, Result};
use tracing::debug;

/// Fréchet distance between Gaussian fits of two embedding populations
pub fn frechet_distance(real: &Embeddings, synth: &Embeddings) -> Result<f64> {
    if real.dim() != synth.dim() {
        return Err(Error::shape_mismatch("fid populations", real.dim(), synth.dim()));
    }
    let n = real.dim();

    let mean_term = squared_distance(&real.mean(), &synth.mean());
    let cov_real = real.covariance()?;
    let cov_synth = synth.covariance()?;

    let sqrt_real = sqrt_psd(&cov_real, n)?;
    let product = matmul(&matmul(&sqrt_real, &cov_synth, n), &sqrt_real, n);
    let cross = trace_sqrt_psd(&product, n)?;

    let distance = mean_term + trace(&cov_real, n) + trace(&cov_synth, n) - 2.0 * cross;
    if !distance.is_finite() {
        return Err(Error::numeric("fid is not finite"));
    }

    debug!(mean_term, cross, distance, "fid computed");
    // Rounding can push identical distributions slightly below zero
    Ok(distance.max(0.0))
}

/// Restraint on the Fréchet distance between real and synthetic embeddings
#[derive(Debug, Clone)]
pub struct FidRestraint {
    name: String,
    bound: Bound,
}

impl FidRestraint {
    /// Create a restraint accepting `lower ≤ fid ≤ upper`
    pub fn new(lower_bound: f64, upper_bound: f64) -> Result<Self> {
        Ok(Self {
            name: RestraintKind::Fid.default_name().to_string(),
            bound: Bound::scalar(lower_bound, upper_bound)?,
        })
    }
}

impl Restraint for FidRestraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn bound(&self) -> &Bound {
        &self.bound
    }

    fn evaluate(&self, data: &LoadedDataset) -> Result<MetricResult> {
        let value = frechet_distance(data.real_embeddings(), data.synth_embeddings())?;
        MetricResult::check(&self.name, MetricValue::Scalar(value), self.bound)
    }
}
