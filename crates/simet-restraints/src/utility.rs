//! Cross-domain utility restraints (TRTS and TSTR)
//!
//! Both directions go through [`train_and_score`]; they differ only in which
//! downstream population is used for training.

use crate::classifier::{SoftmaxClassifier, TrainParams};
use crate::restraint::{Restraint, RestraintKind};
use simet_core::{Bound, Error, LabeledSet, LoadedDataset, MetricResult, MetricValue, Result};
use tracing::debug;

/// Fit a classifier on `train` and return its accuracy on `test`
///
/// The number of classes covers every label seen in either set, so a class
/// absent from training is simply never predicted.
pub fn train_and_score(train: &LabeledSet, test: &LabeledSet, params: &TrainParams) -> Result<f64> {
    if train.is_empty() {
        return Err(Error::insufficient_samples("utility training set", 1, 0));
    }
    if test.is_empty() {
        return Err(Error::insufficient_samples("utility test set", 1, 0));
    }
    if train.dim() != test.dim() {
        return Err(Error::shape_mismatch(
            "utility train vs test features",
            train.dim(),
            test.dim(),
        ));
    }

    let classes = train.num_classes().max(test.num_classes());
    let model = SoftmaxClassifier::fit_set(train, classes, params)?;
    let accuracy = model.accuracy(test)?;

    debug!(
        train = train.len(),
        test = test.len(),
        classes,
        accuracy,
        "utility score computed"
    );
    Ok(accuracy)
}

/// Which population trains the downstream model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityDirection {
    /// Train on real, test on synthetic
    TrainRealTestSynth,
    /// Train on synthetic, test on real
    TrainSynthTestReal,
}

impl UtilityDirection {
    /// `(train, test)` populations for this direction
    pub fn select<'a>(&self, data: &'a LoadedDataset) -> (&'a LabeledSet, &'a LabeledSet) {
        match self {
            Self::TrainRealTestSynth => (data.real_downstream(), data.synth_downstream()),
            Self::TrainSynthTestReal => (data.synth_downstream(), data.real_downstream()),
        }
    }

    fn kind(&self) -> RestraintKind {
        match self {
            Self::TrainRealTestSynth => RestraintKind::Trts,
            Self::TrainSynthTestReal => RestraintKind::Tstr,
        }
    }
}

/// Shared state of both utility restraints
#[derive(Debug, Clone)]
struct UtilityRestraint {
    name: String,
    bound: Bound,
    direction: UtilityDirection,
    params: TrainParams,
}

impl UtilityRestraint {
    fn new(direction: UtilityDirection, lower_bound: f64, upper_bound: f64) -> Result<Self> {
        Ok(Self {
            name: direction.kind().default_name().to_string(),
            bound: Bound::scalar(lower_bound, upper_bound)?,
            direction,
            params: TrainParams::default(),
        })
    }

    fn evaluate(&self, data: &LoadedDataset) -> Result<MetricResult> {
        let (train, test) = self.direction.select(data);
        let score = train_and_score(train, test, &self.params)?;
        MetricResult::check(&self.name, MetricValue::Scalar(score), self.bound)
    }
}

macro_rules! utility_restraint {
    ($(#[$doc:meta])* $ty:ident, $direction:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $ty {
            inner: UtilityRestraint,
        }

        impl $ty {
            /// Create a restraint accepting `lower ≤ accuracy ≤ upper`
            pub fn new(lower_bound: f64, upper_bound: f64) -> Result<Self> {
                Ok(Self {
                    inner: UtilityRestraint::new($direction, lower_bound, upper_bound)?,
                })
            }

            /// Downstream classifier hyper-parameters
            pub fn with_params(mut self, params: TrainParams) -> Result<Self> {
                params.validate()?;
                self.inner.params = params;
                Ok(self)
            }

            pub fn direction(&self) -> UtilityDirection {
                self.inner.direction
            }
        }

        impl Restraint for $ty {
            fn name(&self) -> &str {
                &self.inner.name
            }

            fn bound(&self) -> &Bound {
                &self.inner.bound
            }

            fn evaluate(&self, data: &LoadedDataset) -> Result<MetricResult> {
                self.inner.evaluate(data)
            }
        }
    };
}

utility_restraint!(
    /// Train-Real-Test-Synthetic: accuracy on synthetic data of a model fitted on real data
    SampleTrtsRestraint,
    UtilityDirection::TrainRealTestSynth
);

utility_restraint!(
    /// Train-Synthetic-Test-Real: accuracy on real data of a model fitted on synthetic data
    SampleTstrRestraint,
    UtilityDirection::TrainSynthTestReal
);

#[cfg(test)]
mod tests {
    use super::*;
    use simet_core::Embeddings;

    /// Two classes separated along the first axis
    fn task(offset: f64, flip: bool) -> LabeledSet {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let jitter = (i % 5) as f64 * 0.05;
            rows.push(vec![-1.0 - jitter + offset, jitter]);
            labels.push(usize::from(flip));
            rows.push(vec![1.0 + jitter + offset, -jitter]);
            labels.push(usize::from(!flip));
        }
        LabeledSet::new(Embeddings::from_rows(&rows).unwrap(), labels).unwrap()
    }

    fn dataset(real: LabeledSet, synth: LabeledSet) -> LoadedDataset {
        let emb = Embeddings::from_rows(&[[0.0], [1.0]]).unwrap();
        LoadedDataset::new(emb.clone(), emb, real, synth).unwrap()
    }

    #[test]
    fn test_matching_domains_transfer() {
        let data = dataset(task(0.0, false), task(0.1, false));
        let trts = SampleTrtsRestraint::new(0.9, 1.0).unwrap().evaluate(&data).unwrap();
        let tstr = SampleTstrRestraint::new(0.9, 1.0).unwrap().evaluate(&data).unwrap();
        assert_eq!(trts.value, MetricValue::Scalar(1.0));
        assert_eq!(tstr.value, MetricValue::Scalar(1.0));
        assert!(trts.passed && tstr.passed);
    }

    #[test]
    fn test_flipped_labels_do_not_transfer() {
        let data = dataset(task(0.0, false), task(0.0, true));
        let trts = SampleTrtsRestraint::new(0.5, 1.0).unwrap().evaluate(&data).unwrap();
        assert_eq!(trts.value, MetricValue::Scalar(0.0));
        assert!(!trts.passed);
    }

    #[test]
    fn test_directions_swap_populations() {
        let real = task(0.0, false);
        let synth = task(0.5, false);
        let data = dataset(real.clone(), synth.clone());
        let params = TrainParams::default();

        let trts = SampleTrtsRestraint::new(0.0, 1.0).unwrap().evaluate(&data).unwrap();
        let tstr = SampleTstrRestraint::new(0.0, 1.0).unwrap().evaluate(&data).unwrap();

        assert_eq!(
            trts.value.as_scalar().unwrap(),
            train_and_score(&real, &synth, &params).unwrap()
        );
        assert_eq!(
            tstr.value.as_scalar().unwrap(),
            train_and_score(&synth, &real, &params).unwrap()
        );
    }

    #[test]
    fn test_matches_direct_classifier_scoring() {
        let train = task(0.0, false);
        let test = task(0.2, false);
        let params = TrainParams::default();

        let model = SoftmaxClassifier::fit_set(&train, 2, &params).unwrap();
        let direct = model.accuracy(&test).unwrap();
        assert_eq!(train_and_score(&train, &test, &params).unwrap(), direct);
    }

    #[test]
    fn test_empty_downstream_rejected() {
        let emb = Embeddings::from_rows(&[[0.0], [1.0]]).unwrap();
        let data = LoadedDataset::from_embeddings(emb.clone(), emb).unwrap();
        let err = SampleTstrRestraint::new(0.0, 1.0).unwrap().evaluate(&data).unwrap_err();
        assert!(matches!(err, Error::InsufficientSamples { .. }));
    }
}
