//! Configuration specs for the dataset loader (for YAML/config files)

use crate::extractor::{ExtractorWeights, FeatureExtractor, IdentityExtractor, LinearExtractor};
use crate::loader::{DatasetLoader, DEFAULT_BATCH_SIZE};
use crate::provider::LocalBinaryProvider;
use crate::transform::{SampleDownstreamTransform, TensorTransform};
use serde::{Deserialize, Serialize};
use simet_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A sample source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Directory of sample files; relative paths resolve against the config file
    pub path: PathBuf,
}

/// Feature extractor specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractorSpec {
    /// Transformed samples are the embeddings
    Identity {
        #[serde(default)]
        dim: Option<usize>,
    },

    /// Frozen linear projection
    Linear {
        weights: ExtractorWeights,
        #[serde(default)]
        input_dim: Option<usize>,
        #[serde(default)]
        output_dim: Option<usize>,
        #[serde(default)]
        relu: bool,
        #[serde(default)]
        l2_normalize: bool,
    },
}

impl Default for ExtractorSpec {
    fn default() -> Self {
        Self::Identity { dim: None }
    }
}

impl ExtractorSpec {
    /// Construct the extractor, resolving local weight paths against `base`
    pub fn build(&self, base: &Path) -> Result<Arc<dyn FeatureExtractor>> {
        let extractor: Arc<dyn FeatureExtractor> = match self {
            Self::Identity { dim } => Arc::new(match dim {
                Some(d) => IdentityExtractor::with_dim(*d),
                None => IdentityExtractor::new(),
            }),
            Self::Linear {
                weights,
                input_dim,
                output_dim,
                relu,
                l2_normalize,
            } => {
                let weights = match weights {
                    ExtractorWeights::Local { path } => ExtractorWeights::Local {
                        path: resolve(base, path),
                    },
                    other => other.clone(),
                };
                Arc::new(
                    LinearExtractor::from_weights(&weights, *input_dim, *output_dim)?
                        .with_relu(*relu)
                        .with_l2_normalize(*l2_normalize),
                )
            }
        };
        Ok(extractor)
    }
}

/// Everything needed to build a [`DatasetLoader`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSpec {
    pub real: SourceSpec,

    pub synth: SourceSpec,

    #[serde(default)]
    pub provider_transform: TensorTransform,

    #[serde(default)]
    pub feature_extractor: ExtractorSpec,

    /// Needed only by the TRTS/TSTR restraints
    #[serde(default)]
    pub downstream_transform: Option<SampleDownstreamTransform>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl LoaderSpec {
    /// Validate settings that do not require touching the data
    pub fn validate(&self) -> Result<()> {
        self.provider_transform.validate()?;
        if let Some(downstream) = &self.downstream_transform {
            downstream.features.validate()?;
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        Ok(())
    }

    /// Build the loader; relative paths resolve against `base`
    pub fn build(&self, base: &Path) -> Result<DatasetLoader> {
        self.validate()?;

        let mut loader = DatasetLoader::new(
            Arc::new(LocalBinaryProvider::new(resolve(base, &self.real.path))),
            Arc::new(LocalBinaryProvider::new(resolve(base, &self.synth.path))),
            Arc::new(self.provider_transform.clone()),
            self.feature_extractor.build(base)?,
        )
        .with_batch_size(self.batch_size);

        if let Some(downstream) = &self.downstream_transform {
            loader = loader.with_downstream(Arc::new(downstream.clone()));
        }
        Ok(loader)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
