//! Multinomial logistic (softmax) regression used by the classifier-based metrics
//!
//! Training is full-batch gradient descent from zero weights, so a fit is a
//! deterministic function of its inputs. Features are standardised with
//! statistics taken from the training set only.

use serde::{Deserialize, Serialize};
use simet_core::{Embeddings, Error, LabeledSet, Result};
use tracing::trace;

/// Smallest standard deviation used when standardising a feature
const MIN_STD: f64 = 1e-12;

/// Training hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    /// Number of full-batch gradient steps
    pub epochs: usize,

    /// Gradient descent step size
    pub learning_rate: f64,

    /// L2 penalty on the weights (bias excluded)
    pub l2: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.5,
            l2: 1e-3,
        }
    }
}

impl TrainParams {
    /// Validate hyper-parameters
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::config("training epochs must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::config("learning rate must be positive"));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(Error::config("l2 penalty must be non-negative"));
        }
        Ok(())
    }
}

/// Per-feature standardisation fitted on training data
#[derive(Debug, Clone)]
pub struct Standardizer {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Standardizer {
    /// Fit mean and (population) standard deviation per feature
    pub fn fit(features: &Embeddings) -> Self {
        let mean = features.mean();
        let mut var = vec![0.0; features.dim()];
        for row in features.iter_rows() {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                *v += (x - m) * (x - m);
            }
        }
        let n = features.rows().max(1) as f64;
        let std = var.iter().map(|v| (v / n).sqrt().max(MIN_STD)).collect();
        Self { mean, std }
    }

    /// Standardise one row
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

/// Fitted softmax classifier
#[derive(Debug, Clone)]
pub struct SoftmaxClassifier {
    classes: usize,
    dim: usize,
    /// `classes x dim`, row-major
    weights: Vec<f64>,
    bias: Vec<f64>,
    scaler: Standardizer,
}

impl SoftmaxClassifier {
    /// Fit on `features` with labels in `0..classes`
    pub fn fit(
        features: &Embeddings,
        labels: &[usize],
        classes: usize,
        params: &TrainParams,
    ) -> Result<Self> {
        params.validate()?;
        if features.is_empty() {
            return Err(Error::insufficient_samples("classifier training set", 1, 0));
        }
        if features.rows() != labels.len() {
            return Err(Error::shape_mismatch(
                "classifier labels",
                features.rows(),
                labels.len(),
            ));
        }
        if classes == 0 {
            return Err(Error::config("classifier needs at least one class"));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= classes) {
            return Err(Error::invalid_input(format!(
                "label {bad} outside 0..{classes}"
            )));
        }

        let dim = features.dim();
        let scaler = Standardizer::fit(features);
        let inputs: Vec<Vec<f64>> = features.iter_rows().map(|r| scaler.transform(r)).collect();

        let mut model = Self {
            classes,
            dim,
            weights: vec![0.0; classes * dim],
            bias: vec![0.0; classes],
            scaler,
        };

        let n = inputs.len() as f64;
        let mut grad_w = vec![0.0; classes * dim];
        let mut grad_b = vec![0.0; classes];
        let mut probs = vec![0.0; classes];

        for epoch in 0..params.epochs {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            grad_b.iter_mut().for_each(|g| *g = 0.0);
            let mut loss = 0.0;

            for (x, &label) in inputs.iter().zip(labels) {
                model.softmax_into(x, &mut probs);
                loss -= probs[label].max(f64::MIN_POSITIVE).ln();

                for c in 0..classes {
                    let err = probs[c] - if c == label { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    let g = &mut grad_w[c * dim..(c + 1) * dim];
                    for (gj, xj) in g.iter_mut().zip(x) {
                        *gj += err * xj;
                    }
                }
            }

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            for (b, g) in model.bias.iter_mut().zip(&grad_b) {
                *b -= params.learning_rate * g / n;
            }

            if epoch % 50 == 0 {
                trace!(epoch, loss = loss / n, "softmax training");
            }
        }

        if model.weights.iter().chain(&model.bias).any(|v| !v.is_finite()) {
            return Err(Error::numeric("classifier weights diverged"));
        }

        Ok(model)
    }

    /// Fit on a labelled set, using `classes` output classes
    pub fn fit_set(set: &LabeledSet, classes: usize, params: &TrainParams) -> Result<Self> {
        Self::fit(set.features(), set.labels(), classes, params)
    }

    /// Number of output classes
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Class probabilities for one raw (unstandardised) row
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let x = self.scaler.transform(row);
        let mut probs = vec![0.0; self.classes];
        self.softmax_into(&x, &mut probs);
        probs
    }

    /// Most probable class for one raw row (lowest index wins ties)
    pub fn predict(&self, row: &[f64]) -> usize {
        let probs = self.predict_proba(row);
        let mut best = 0;
        for (c, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = c;
            }
        }
        best
    }

    /// Fraction of correctly classified rows
    pub fn accuracy(&self, set: &LabeledSet) -> Result<f64> {
        if set.is_empty() {
            return Err(Error::insufficient_samples("classifier evaluation set", 1, 0));
        }
        if set.dim() != self.dim {
            return Err(Error::shape_mismatch(
                "classifier evaluation features",
                self.dim,
                set.dim(),
            ));
        }
        let correct = set
            .features()
            .iter_rows()
            .zip(set.labels())
            .filter(|(row, &label)| self.predict(row) == label)
            .count();
        Ok(correct as f64 / set.len() as f64)
    }

    fn softmax_into(&self, x: &[f64], out: &mut [f64]) {
        for (c, o) in out.iter_mut().enumerate() {
            let w = &self.weights[c * self.dim..(c + 1) * self.dim];
            *o = self.bias[c] + w.iter().zip(x).map(|(a, b)| a * b).sum::<f64>();
        }
        let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut total = 0.0;
        for o in out.iter_mut() {
            *o = (*o - max).exp();
            total += *o;
        }
        for o in out.iter_mut() {
            *o /= total;
        }
    }
}
