//! Embedding matrices, labelled downstream sets and the loaded dataset bundle

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Row-major matrix of embeddings, one row per sample
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    rows: usize,
    dim: usize,
    data: Vec<f64>,
}

impl Embeddings {
    /// An empty population with a known dimensionality
    pub fn empty(dim: usize) -> Self {
        Self {
            rows: 0,
            dim,
            data: Vec::new(),
        }
    }

    /// Build from flat row-major data
    pub fn from_flat(rows: usize, dim: usize, data: Vec<f64>) -> Result<Self> {
        if rows * dim != data.len() {
            return Err(Error::shape_mismatch(
                "embedding matrix",
                format!("{} values ({rows}x{dim})", rows * dim),
                data.len(),
            ));
        }
        if rows > 0 && dim == 0 {
            return Err(Error::invalid_input("embeddings must have at least one dimension"));
        }
        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            return Err(Error::invalid_input(format!(
                "non-finite value in row {}",
                pos / dim.max(1)
            )));
        }
        Ok(Self { rows, dim, data })
    }

    /// Build from individual rows; every row must have the same length
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let dim = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(Error::shape_mismatch(format!("embedding row {i}"), dim, row.len()));
            }
            data.extend_from_slice(row);
        }
        Self::from_flat(rows.len(), dim, data)
    }

    /// Build from `f32` rows as produced by feature extractors
    pub fn from_rows_f32<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let widened: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| r.as_ref().iter().map(|&v| f64::from(v)).collect())
            .collect();
        Self::from_rows(&widened)
    }

    /// Number of samples
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Embedding dimensionality
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `i`
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate over rows
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Flat row-major data
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Per-dimension mean
    pub fn mean(&self) -> Vec<f64> {
        let mut mean = vec![0.0; self.dim];
        if self.rows == 0 {
            return mean;
        }
        for row in self.iter_rows() {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        let n = self.rows as f64;
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    }

    /// Unbiased covariance matrix (`dim x dim`, row-major)
    pub fn covariance(&self) -> Result<Vec<f64>> {
        if self.rows < 2 {
            return Err(Error::insufficient_samples("covariance", 2, self.rows));
        }
        let d = self.dim;
        let mean = self.mean();
        let mut cov = vec![0.0; d * d];
        let mut centered = vec![0.0; d];

        for row in self.iter_rows() {
            for (c, (v, m)) in centered.iter_mut().zip(row.iter().zip(&mean)) {
                *c = v - m;
            }
            for i in 0..d {
                let ci = centered[i];
                for j in i..d {
                    cov[i * d + j] += ci * centered[j];
                }
            }
        }

        let denom = (self.rows - 1) as f64;
        for i in 0..d {
            for j in i..d {
                let v = cov[i * d + j] / denom;
                cov[i * d + j] = v;
                cov[j * d + i] = v;
            }
        }
        Ok(cov)
    }

    /// New matrix holding the given rows, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.dim);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            rows: indices.len(),
            dim: self.dim,
            data,
        }
    }

    /// Stack two matrices of equal dimensionality
    pub fn concat(&self, other: &Self) -> Result<Self> {
        if !self.is_empty() && !other.is_empty() && self.dim != other.dim {
            return Err(Error::shape_mismatch("embedding concat", self.dim, other.dim));
        }
        let dim = if self.is_empty() { other.dim } else { self.dim };
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        Ok(Self {
            rows: self.rows + other.rows,
            dim,
            data,
        })
    }
}

/// Downstream task population: feature rows with one class label each
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSet {
    features: Embeddings,
    labels: Vec<usize>,
}

impl LabeledSet {
    /// Pair features with labels; lengths must agree
    pub fn new(features: Embeddings, labels: Vec<usize>) -> Result<Self> {
        if features.rows() != labels.len() {
            return Err(Error::shape_mismatch(
                "labelled set",
                format!("{} labels", features.rows()),
                labels.len(),
            ));
        }
        Ok(Self { features, labels })
    }

    /// An empty set
    pub fn empty() -> Self {
        Self {
            features: Embeddings::empty(0),
            labels: Vec::new(),
        }
    }

    pub fn features(&self) -> &Embeddings {
        &self.features
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.features.dim()
    }

    /// Number of classes implied by the largest label
    pub fn num_classes(&self) -> usize {
        self.labels.iter().max().map(|m| m + 1).unwrap_or(0)
    }

    /// Subset by row indices
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Immutable bundle shared read-only by every restraint in a run
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    real_embeddings: Embeddings,
    synth_embeddings: Embeddings,
    real_downstream: LabeledSet,
    synth_downstream: LabeledSet,
}

impl LoadedDataset {
    /// Assemble the bundle, checking that paired populations agree on dimensionality
    pub fn new(
        real_embeddings: Embeddings,
        synth_embeddings: Embeddings,
        real_downstream: LabeledSet,
        synth_downstream: LabeledSet,
    ) -> Result<Self> {
        if real_embeddings.dim() != synth_embeddings.dim() {
            return Err(Error::shape_mismatch(
                "real vs synthetic embeddings",
                real_embeddings.dim(),
                synth_embeddings.dim(),
            ));
        }
        if !real_downstream.is_empty()
            && !synth_downstream.is_empty()
            && real_downstream.dim() != synth_downstream.dim()
        {
            return Err(Error::shape_mismatch(
                "real vs synthetic downstream features",
                real_downstream.dim(),
                synth_downstream.dim(),
            ));
        }
        Ok(Self {
            real_embeddings,
            synth_embeddings,
            real_downstream,
            synth_downstream,
        })
    }

    /// Bundle with embeddings only (no downstream task)
    pub fn from_embeddings(real: Embeddings, synth: Embeddings) -> Result<Self> {
        Self::new(real, synth, LabeledSet::empty(), LabeledSet::empty())
    }

    pub fn real_embeddings(&self) -> &Embeddings {
        &self.real_embeddings
    }

    pub fn synth_embeddings(&self) -> &Embeddings {
        &self.synth_embeddings
    }

    pub fn real_downstream(&self) -> &LabeledSet {
        &self.real_downstream
    }

    pub fn synth_downstream(&self) -> &LabeledSet {
        &self.synth_downstream
    }
}

/// Anything that can produce the dataset bundle for a pipeline run
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Load both populations; called once per run
    async fn load(&self) -> Result<LoadedDataset>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = Embeddings::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_from_rows_rejects_non_finite() {
        let err = Embeddings::from_rows(&[vec![1.0, f64::NAN]]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_mean_and_covariance() {
        let e = Embeddings::from_rows(&[vec![1.0, 2.0], vec![3.0, 6.0], vec![5.0, 10.0]]).unwrap();
        assert_eq!(e.mean(), vec![3.0, 6.0]);

        let cov = e.covariance().unwrap();
        // var(x) = 4, var(y) = 16, cov = 8
        assert!((cov[0] - 4.0).abs() < 1e-12);
        assert!((cov[1] - 8.0).abs() < 1e-12);
        assert!((cov[2] - 8.0).abs() < 1e-12);
        assert!((cov[3] - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_needs_two_rows() {
        let e = Embeddings::from_rows(&[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            e.covariance().unwrap_err(),
            Error::InsufficientSamples { required: 2, found: 1, .. }
        ));
    }

    #[test]
    fn test_select_and_concat() {
        let a = Embeddings::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let b = Embeddings::from_rows(&[vec![4.0]]).unwrap();
        let picked = a.select(&[2, 0]);
        assert_eq!(picked.as_slice(), &[3.0, 1.0]);

        let both = a.concat(&b).unwrap();
        assert_eq!(both.rows(), 4);
        assert_eq!(both.row(3), &[4.0]);
    }

    #[test]
    fn test_loaded_dataset_rejects_dim_mismatch() {
        let real = Embeddings::from_rows(&[vec![1.0, 2.0]]).unwrap();
        let synth = Embeddings::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        let err = LoadedDataset::from_embeddings(real, synth).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_labeled_set_length_check() {
        let features = Embeddings::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        assert!(LabeledSet::new(features.clone(), vec![0]).is_err());
        let set = LabeledSet::new(features, vec![0, 3]).unwrap();
        assert_eq!(set.num_classes(), 4);
    }
}
