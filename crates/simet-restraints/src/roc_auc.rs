//! Classifier two-sample test: ROC-AUC of a real-vs-synthetic classifier
//!
//! Real embeddings are labelled 0 and synthetic ones 1. A softmax classifier
//! is trained on a stratified split and scored on the held-out part. An AUC
//! near 0.5 means the domains are indistinguishable.

use crate::classifier::{SoftmaxClassifier, TrainParams};
use crate::restraint::{Restraint, RestraintKind};
use crate::split::stratified_split;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use simet_core::{seed, Bound, Error, LoadedDataset, MetricResult, MetricValue, Result};
use tracing::debug;

/// Default fraction of each class held out for scoring
pub const DEFAULT_TEST_FRACTION: f64 = 0.25;

/// Area under the ROC curve via the Mann–Whitney rank statistic
///
/// Tied scores receive their average rank, so a constant scorer yields 0.5.
pub fn roc_auc(scores: &[f64], positives: &[bool]) -> Result<f64> {
    if scores.len() != positives.len() {
        return Err(Error::shape_mismatch("roc scores", positives.len(), scores.len()));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(Error::numeric("roc scores contain NaN"));
    }

    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(Error::insufficient_samples(
            "roc auc (both classes required)",
            1,
            n_pos.min(n_neg),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1..=end share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            if positives[idx] {
                rank_sum_pos += avg_rank;
            }
        }
        start = end;
    }

    let n_pos_f = n_pos as f64;
    let u = rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Ok(u / (n_pos_f * n_neg as f64))
}

/// Restraint on the ROC-AUC of a real-vs-synthetic classifier
#[derive(Debug, Clone)]
pub struct RocAucRestraint {
    name: String,
    bound: Bound,
    test_fraction: f64,
    params: TrainParams,
    seed: Option<u64>,
}

impl RocAucRestraint {
    /// Create a restraint accepting `lower ≤ auc ≤ upper`
    pub fn new(lower_bound: f64, upper_bound: f64) -> Result<Self> {
        Ok(Self {
            name: RestraintKind::RocAuc.default_name().to_string(),
            bound: Bound::scalar(lower_bound, upper_bound)?,
            test_fraction: DEFAULT_TEST_FRACTION,
            params: TrainParams::default(),
            seed: None,
        })
    }

    /// Fraction of each domain held out for scoring, in `(0, 1)`
    pub fn with_test_fraction(mut self, fraction: f64) -> Result<Self> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(Error::config(format!(
                "roc auc test fraction must lie in (0, 1), got {fraction}"
            )));
        }
        self.test_fraction = fraction;
        Ok(self)
    }

    /// Classifier hyper-parameters
    pub fn with_params(mut self, params: TrainParams) -> Result<Self> {
        params.validate()?;
        self.params = params;
        Ok(self)
    }

    /// Fixed split seed instead of one derived from the global seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => seed::rng_for(&self.name),
        }
    }
}

impl Restraint for RocAucRestraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn bound(&self) -> &Bound {
        &self.bound
    }

    fn evaluate(&self, data: &LoadedDataset) -> Result<MetricResult> {
        let real = data.real_embeddings();
        let synth = data.synth_embeddings();

        let combined = real.concat(synth)?;
        let labels: Vec<usize> = std::iter::repeat(0)
            .take(real.rows())
            .chain(std::iter::repeat(1).take(synth.rows()))
            .collect();

        let mut rng = self.rng();
        let split = stratified_split(&labels, self.test_fraction, &mut rng)?;

        let train_labels: Vec<usize> = split.train.iter().map(|&i| labels[i]).collect();
        let model = SoftmaxClassifier::fit(
            &combined.select(&split.train),
            &train_labels,
            2,
            &self.params,
        )?;

        let test = combined.select(&split.test);
        let scores: Vec<f64> = test.iter_rows().map(|row| model.predict_proba(row)[1]).collect();
        let positives: Vec<bool> = split.test.iter().map(|&i| labels[i] == 1).collect();
        let auc = roc_auc(&scores, &positives)?;

        debug!(
            train = split.train.len(),
            test = split.test.len(),
            auc,
            "roc auc computed"
        );
        MetricResult::check(&self.name, MetricValue::Scalar(auc), self.bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use simet_core::Embeddings;

    #[test]
    fn test_perfect_separation() {
        let scores = [0.1, 0.2, 0.3, 0.8, 0.9];
        let positives = [false, false, false, true, true];
        assert_eq!(roc_auc(&scores, &positives).unwrap(), 1.0);
    }

    #[test]
    fn test_inverted_separation() {
        let scores = [0.9, 0.8, 0.1, 0.2];
        let positives = [false, false, true, true];
        assert_eq!(roc_auc(&scores, &positives).unwrap(), 0.0);
    }

    #[test]
    fn test_constant_scores_give_half() {
        let scores = [0.5; 6];
        let positives = [true, false, true, false, false, true];
        assert_eq!(roc_auc(&scores, &positives).unwrap(), 0.5);
    }

    #[test]
    fn test_known_value_with_ties() {
        // pos: 0.4, 0.6 ; neg: 0.2, 0.4
        // pairs: (0.4 vs 0.2)=1, (0.4 vs 0.4)=0.5, (0.6 vs 0.2)=1, (0.6 vs 0.4)=1 -> 3.5/4
        let scores = [0.4, 0.6, 0.2, 0.4];
        let positives = [true, true, false, false];
        assert!((roc_auc(&scores, &positives).unwrap() - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_rejected() {
        assert!(roc_auc(&[0.1, 0.2], &[true, true]).is_err());
    }

    fn cloud(rows: usize, dim: usize, offset: f64, seed: u64) -> Embeddings {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let data: Vec<Vec<f64>> = (0..rows)
            .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0) + offset).collect())
            .collect();
        Embeddings::from_rows(&data).unwrap()
    }

    #[test]
    fn test_separable_domains_score_high() {
        let data =
            LoadedDataset::from_embeddings(cloud(100, 3, 0.0, 1), cloud(100, 3, 3.0, 2)).unwrap();
        let restraint = RocAucRestraint::new(0.4, 0.6).unwrap().with_seed(7);

        let result = restraint.evaluate(&data).unwrap();
        assert!(result.value.as_scalar().unwrap() > 0.99);
        assert!(!result.passed);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let data =
            LoadedDataset::from_embeddings(cloud(80, 4, 0.0, 3), cloud(80, 4, 0.1, 4)).unwrap();
        let restraint = RocAucRestraint::new(0.0, 1.0).unwrap().with_seed(11);

        let a = restraint.evaluate(&data).unwrap();
        let b = restraint.evaluate(&data).unwrap();
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn test_tiny_population_rejected() {
        let data = LoadedDataset::from_embeddings(cloud(1, 2, 0.0, 5), cloud(10, 2, 0.0, 6)).unwrap();
        let err = RocAucRestraint::new(0.0, 1.0).unwrap().evaluate(&data).unwrap_err();
        assert!(matches!(err, Error::InsufficientSamples { .. }));
    }

    #[test]
    fn test_fraction_validated() {
        assert!(RocAucRestraint::new(0.0, 1.0).unwrap().with_test_fraction(1.5).is_err());
    }
}
