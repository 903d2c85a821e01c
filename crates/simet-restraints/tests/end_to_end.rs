//! End-to-end metric behaviour on Gaussian populations
//!
//! Real and synthetic embeddings are 500 x 64 draws from seeded standard
//! normals, evaluated through the full pipeline.

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use simet_core::{DatasetSource, Embeddings, LabeledSet, LoadedDataset, MetricValue, Result};
use simet_restraints::prelude::*;
use simet_restraints::{frechet_distance, precision_recall};

const ROWS: usize = 500;
const DIM: usize = 64;

fn gaussian(rows: usize, dim: usize, shift: f64, seed: u64) -> Embeddings {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data: Vec<f64> = (0..rows * dim)
        .map(|_| {
            let z: f64 = StandardNormal.sample(&mut rng);
            z + shift
        })
        .collect();
    Embeddings::from_flat(rows, dim, data).unwrap()
}

/// Two classes centred at -2 and +2 on the first axis
fn labelled(rows: usize, seed: u64) -> LabeledSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(rows * 4);
    let mut labels = Vec::with_capacity(rows);
    for i in 0..rows {
        let label = i % 2;
        let centre = if label == 0 { -2.0 } else { 2.0 };
        for d in 0..4 {
            let z: f64 = StandardNormal.sample(&mut rng);
            data.push(if d == 0 { centre + z } else { z });
        }
        labels.push(label);
    }
    LabeledSet::new(Embeddings::from_flat(rows, 4, data).unwrap(), labels).unwrap()
}

struct StaticSource(LoadedDataset);

#[async_trait]
impl DatasetSource for StaticSource {
    async fn load(&self) -> Result<LoadedDataset> {
        Ok(self.0.clone())
    }
}

fn fidelity_pipeline(data: LoadedDataset) -> Pipeline {
    PipelineBuilder::new()
        .loader(StaticSource(data))
        .restraint(FidRestraint::new(0.0, 30.0).unwrap())
        .restraint(PrecisionRecallRestraint::new((0.7, 0.7), (1.0, 1.0)).unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_same_distribution_passes() {
    let data =
        LoadedDataset::from_embeddings(gaussian(ROWS, DIM, 0.0, 1), gaussian(ROWS, DIM, 0.0, 2))
            .unwrap();

    let report = fidelity_pipeline(data).run().await.unwrap();

    let fid = report.get("fid").unwrap().value.as_scalar().unwrap();
    // Finite-sample bias keeps this well above zero but far below a real shift
    assert!(fid < 10.0, "fid was {fid}");

    let (precision, recall) = report.get("precision_recall").unwrap().value.as_pair().unwrap();
    assert!(precision >= 0.7, "precision was {precision}");
    assert!(recall >= 0.7, "recall was {recall}");
    assert!(report.passed);
}

#[tokio::test]
async fn test_shifted_distribution_fails() {
    let data =
        LoadedDataset::from_embeddings(gaussian(ROWS, DIM, 0.0, 1), gaussian(ROWS, DIM, 10.0, 2))
            .unwrap();

    let report = fidelity_pipeline(data).run().await.unwrap();

    let fid = report.get("fid").unwrap().value.as_scalar().unwrap();
    assert!(fid > 50.0, "fid was {fid}");
    assert!(!report.get("fid").unwrap().passed);
    assert!(!report.passed);
}

#[test]
fn test_identical_populations() {
    let pop = gaussian(ROWS, DIM, 0.0, 3);

    let fid = frechet_distance(&pop, &pop).unwrap();
    assert!(fid.abs() < 1e-6, "fid was {fid}");

    let (precision, recall) = precision_recall(&pop, &pop, 10).unwrap();
    assert_eq!((precision, recall), (1.0, 1.0));
}

#[test]
fn test_roc_auc_near_chance_for_same_distribution() {
    let data =
        LoadedDataset::from_embeddings(gaussian(ROWS, DIM, 0.0, 4), gaussian(ROWS, DIM, 0.0, 5))
            .unwrap();

    let seeds = [11_u64, 12, 13, 14, 15];
    let mean_auc: f64 = seeds
        .iter()
        .map(|&seed| {
            let restraint = RocAucRestraint::new(0.0, 1.0).unwrap().with_seed(seed);
            restraint.evaluate(&data).unwrap().value.as_scalar().unwrap()
        })
        .sum::<f64>()
        / seeds.len() as f64;

    assert!((mean_auc - 0.5).abs() < 0.06, "mean auc was {mean_auc}");
}

#[test]
fn test_roc_auc_detects_shift() {
    let data =
        LoadedDataset::from_embeddings(gaussian(ROWS, DIM, 0.0, 6), gaussian(ROWS, DIM, 1.0, 7))
            .unwrap();

    let result = RocAucRestraint::new(0.4, 0.6)
        .unwrap()
        .with_seed(1)
        .evaluate(&data)
        .unwrap();
    assert!(result.value.as_scalar().unwrap() > 0.95);
    assert!(!result.passed);
}

#[tokio::test]
async fn test_utility_restraints_on_matching_tasks() {
    let emb = gaussian(50, 4, 0.0, 8);
    let data = LoadedDataset::new(emb.clone(), emb, labelled(400, 9), labelled(400, 10)).unwrap();

    let pipeline = PipelineBuilder::new()
        .loader(StaticSource(data))
        .restraint(SampleTrtsRestraint::new(0.9, 1.0).unwrap())
        .restraint(SampleTstrRestraint::new(0.9, 1.0).unwrap())
        .execution(ExecutionMode::Sequential)
        .build()
        .unwrap();

    let report = pipeline.run().await.unwrap();
    for name in ["trts", "tstr"] {
        let result = report.get(name).unwrap();
        match result.value {
            MetricValue::Scalar(acc) => assert!(acc > 0.9, "{name} accuracy was {acc}"),
            other => panic!("unexpected value {other:?}"),
        }
    }
    assert!(report.passed);
}
