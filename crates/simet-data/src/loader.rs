//! Dataset loader: providers, transforms and extractor composed into one load
//!
//! The two populations are fetched concurrently; CPU-bound transform and
//! extraction work runs on the blocking pool.

use crate::extractor::FeatureExtractor;
use crate::provider::{Provider, Sample};
use crate::transform::{DownstreamTransform, ProviderTransform};
use async_trait::async_trait;
use simet_core::{DatasetSource, Embeddings, Error, LabeledSet, LoadedDataset, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Default extractor batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Loads real and synthetic populations into a [`LoadedDataset`]
#[derive(Clone)]
pub struct DatasetLoader {
    real: Arc<dyn Provider>,
    synth: Arc<dyn Provider>,
    provider_transform: Arc<dyn ProviderTransform>,
    extractor: Arc<dyn FeatureExtractor>,
    downstream_transform: Option<Arc<dyn DownstreamTransform>>,
    batch_size: usize,
}

impl DatasetLoader {
    pub fn new(
        real: Arc<dyn Provider>,
        synth: Arc<dyn Provider>,
        provider_transform: Arc<dyn ProviderTransform>,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Self {
        Self {
            real,
            synth,
            provider_transform,
            extractor,
            downstream_transform: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Also build downstream task sets for the utility metrics
    pub fn with_downstream(mut self, transform: Arc<dyn DownstreamTransform>) -> Self {
        self.downstream_transform = Some(transform);
        self
    }

    /// Samples per extractor call (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fetch and process one population on the blocking pool
    async fn load_population(
        &self,
        provider: &Arc<dyn Provider>,
        population: &'static str,
    ) -> Result<(Embeddings, LabeledSet)> {
        let samples = provider
            .fetch()
            .await
            .map_err(|e| e.in_stage(format!("{population} provider")))?;
        if samples.is_empty() {
            return Err(Error::insufficient_samples(
                format!("{population} population"),
                1,
                0,
            ));
        }
        info!(
            population,
            source = %provider.describe(),
            samples = samples.len(),
            "Fetched samples"
        );

        let worker = PopulationWorker {
            population,
            provider_transform: Arc::clone(&self.provider_transform),
            extractor: Arc::clone(&self.extractor),
            downstream_transform: self.downstream_transform.clone(),
            batch_size: self.batch_size,
        };

        tokio::task::spawn_blocking(move || worker.process(&samples))
            .await
            .map_err(|e| Error::internal(format!("{population} processing task failed: {e}")))?
    }
}

#[async_trait]
impl DatasetSource for DatasetLoader {
    async fn load(&self) -> Result<LoadedDataset> {
        let (real, synth) = futures::try_join!(
            self.load_population(&self.real, "real"),
            self.load_population(&self.synth, "synth"),
        )?;
        let (real_embeddings, real_downstream) = real;
        let (synth_embeddings, synth_downstream) = synth;

        let data = LoadedDataset::new(
            real_embeddings,
            synth_embeddings,
            real_downstream,
            synth_downstream,
        )?;
        info!(
            real = data.real_embeddings().rows(),
            synth = data.synth_embeddings().rows(),
            dim = data.real_embeddings().dim(),
            downstream = !data.real_downstream().is_empty(),
            "Dataset assembled"
        );
        Ok(data)
    }
}

/// Owned state moved onto the blocking pool
struct PopulationWorker {
    population: &'static str,
    provider_transform: Arc<dyn ProviderTransform>,
    extractor: Arc<dyn FeatureExtractor>,
    downstream_transform: Option<Arc<dyn DownstreamTransform>>,
    batch_size: usize,
}

impl PopulationWorker {
    fn process(&self, samples: &[Sample]) -> Result<(Embeddings, LabeledSet)> {
        let embeddings = self.embed(samples)?;
        let downstream = match &self.downstream_transform {
            Some(transform) => self.downstream(transform.as_ref(), samples)?,
            None => LabeledSet::empty(),
        };
        Ok((embeddings, downstream))
    }

    fn embed(&self, samples: &[Sample]) -> Result<Embeddings> {
        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(samples.len());

        for (batch_index, chunk) in samples.chunks(self.batch_size).enumerate() {
            let inputs = chunk
                .iter()
                .map(|s| self.provider_transform.apply(s))
                .collect::<Result<Vec<_>>>()?;

            let outputs = self.extractor.extract(&inputs)?;
            if outputs.len() != inputs.len() {
                return Err(Error::extractor(format!(
                    "{} returned {} embeddings for {} inputs",
                    self.extractor.name(),
                    outputs.len(),
                    inputs.len()
                )));
            }
            debug!(
                population = self.population,
                batch = batch_index,
                size = outputs.len(),
                "Extracted batch"
            );
            rows.extend(outputs);
        }

        Embeddings::from_rows_f32(&rows)
            .map_err(|e| e.in_stage(format!("{} embeddings", self.population)))
    }

    fn downstream(
        &self,
        transform: &dyn DownstreamTransform,
        samples: &[Sample],
    ) -> Result<LabeledSet> {
        let mut features = Vec::with_capacity(samples.len());
        let mut labels = Vec::with_capacity(samples.len());
        for sample in samples {
            let (feature, label) = transform.apply(sample)?;
            features.push(feature);
            labels.push(label);
        }

        let features = Embeddings::from_rows_f32(&features)
            .map_err(|e| e.in_stage(format!("{} downstream features", self.population)))?;
        debug!(
            population = self.population,
            rows = labels.len(),
            "Built downstream set"
        );
        LabeledSet::new(features, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::IdentityExtractor;
    use crate::provider::InMemoryProvider;
    use crate::transform::TensorTransform;

    fn loader(real: Vec<Vec<f32>>, synth: Vec<Vec<f32>>) -> DatasetLoader {
        DatasetLoader::new(
            Arc::new(InMemoryProvider::from_vectors(real)),
            Arc::new(InMemoryProvider::from_vectors(synth)),
            Arc::new(TensorTransform::default()),
            Arc::new(IdentityExtractor::new()),
        )
    }

    #[tokio::test]
    async fn test_identity_load() {
        let data = loader(vec![vec![1.0, 2.0], vec![3.0, 4.0]], vec![vec![5.0, 6.0]])
            .load()
            .await
            .unwrap();
        assert_eq!(data.real_embeddings().rows(), 2);
        assert_eq!(data.synth_embeddings().row(0), &[5.0, 6.0]);
        assert!(data.real_downstream().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_between_domains() {
        let err = loader(vec![vec![1.0, 2.0]], vec![vec![1.0, 2.0, 3.0]])
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_ragged_population_rejected() {
        let err = loader(vec![vec![1.0, 2.0], vec![1.0]], vec![vec![1.0, 2.0]])
            .load()
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some("real embeddings"));
        assert!(matches!(err.root_cause(), Error::ShapeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_empty_population_rejected() {
        let err = loader(vec![], vec![vec![1.0]]).load().await.unwrap_err();
        assert!(matches!(err, Error::InsufficientSamples { .. }));
    }

    #[test]
    fn test_batch_size_floor() {
        assert_eq!(loader(vec![], vec![]).with_batch_size(0).batch_size(), 1);
    }
}
