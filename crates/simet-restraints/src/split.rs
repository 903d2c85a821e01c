//! Seeded, stratified train/test splitting

use rand::seq::SliceRandom;
use rand::Rng;
use simet_core::{Error, Result};
use std::collections::BTreeMap;

/// Index partition of a labelled population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split indices so every class appears in both partitions
///
/// Each class is shuffled independently and `round(len · test_fraction)`
/// of its members (at least one, leaving at least one) go to the test side.
/// Classes are visited in label order so the result depends only on the RNG
/// state and the labels.
pub fn stratified_split<R: Rng + ?Sized>(
    labels: &[usize],
    test_fraction: f64,
    rng: &mut R,
) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::config(format!(
            "test fraction must lie in (0, 1), got {test_fraction}"
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut split = Split {
        train: Vec::with_capacity(labels.len()),
        test: Vec::new(),
    };

    for (label, mut members) in by_class {
        if members.len() < 2 {
            return Err(Error::insufficient_samples(
                format!("stratified split of class {label}"),
                2,
                members.len(),
            ));
        }
        members.shuffle(rng);

        let wanted = (members.len() as f64 * test_fraction).round() as usize;
        let n_test = wanted.clamp(1, members.len() - 1);
        split.test.extend_from_slice(&members[..n_test]);
        split.train.extend_from_slice(&members[n_test..]);
    }

    Ok(split)
}
