//! Feature extractors
//!
//! Extractors map a batch of transformed samples to embedding vectors. They
//! are frozen: the same input always yields the same embedding, whatever the
//! batch it arrives in.

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module};
use hf_hub::{api::sync::Api, Repo, RepoType};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use simet_core::{seed, Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Batch of inputs to batch of embeddings
pub trait FeatureExtractor: Send + Sync {
    /// Extractor name, for logging
    fn name(&self) -> &str;

    /// Embedding width, when known up front
    fn output_dim(&self) -> Option<usize> {
        None
    }

    /// Embed every input; output order matches input order
    fn extract(&self, batch: &[Vec<f32>]) -> Result<Vec<Vec<f32>>>;
}

/// Uses the transformed sample itself as the embedding
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityExtractor {
    dim: Option<usize>,
}

impl IdentityExtractor {
    pub fn new() -> Self {
        Self { dim: None }
    }

    /// Require every input to have exactly `dim` values
    pub fn with_dim(dim: usize) -> Self {
        Self { dim: Some(dim) }
    }
}

impl FeatureExtractor for IdentityExtractor {
    fn name(&self) -> &str {
        "identity"
    }

    fn output_dim(&self) -> Option<usize> {
        self.dim
    }

    fn extract(&self, batch: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if let Some(dim) = self.dim {
            if let Some((i, row)) = batch.iter().enumerate().find(|(_, r)| r.len() != dim) {
                return Err(Error::shape_mismatch(
                    format!("identity extractor input {i}"),
                    dim,
                    row.len(),
                ));
            }
        }
        Ok(batch.to_vec())
    }
}

/// Where linear projection weights come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ExtractorWeights {
    /// Safetensors file with `weight` `[out, in]` and optional `bias` `[out]`
    Local { path: PathBuf },

    /// Safetensors file on the Hugging Face Hub
    HuggingFace {
        repo_id: String,
        filename: String,
        revision: Option<String>,
    },

    /// Random Gaussian projection drawn from a ChaCha stream
    Seeded {
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

fn default_seed() -> u64 {
    seed::DEFAULT_SEED
}

/// Frozen linear projection, optionally followed by ReLU and L2 normalisation
#[derive(Debug, Clone)]
pub struct LinearExtractor {
    layer: Linear,
    input_dim: usize,
    output_dim: usize,
    relu: bool,
    l2_normalize: bool,
    device: Device,
}

impl LinearExtractor {
    /// Build from a `[out, in]` weight and optional `[out]` bias
    pub fn from_tensors(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        let weight = weight.to_dtype(DType::F32).map_err(candle_error)?;
        let (output_dim, input_dim) = weight.dims2().map_err(candle_error)?;
        if input_dim == 0 || output_dim == 0 {
            return Err(Error::extractor("projection weight must be non-empty"));
        }

        let bias = match bias {
            Some(b) => {
                let b = b.to_dtype(DType::F32).map_err(candle_error)?;
                let len = b.dims1().map_err(candle_error)?;
                if len != output_dim {
                    return Err(Error::shape_mismatch("projection bias", output_dim, len));
                }
                Some(b)
            }
            None => None,
        };

        let device = weight.device().clone();
        Ok(Self {
            layer: Linear::new(weight, bias),
            input_dim,
            output_dim,
            relu: false,
            l2_normalize: false,
            device,
        })
    }

    /// Load weights from a local safetensors file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::not_found(format!(
                "extractor weights {} do not exist",
                path.display()
            )));
        }
        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu).map_err(candle_error)?;
        let weight = tensors.remove("weight").ok_or_else(|| {
            Error::extractor(format!("{} has no 'weight' tensor", path.display()))
        })?;
        let bias = tensors.remove("bias");

        let extractor = Self::from_tensors(weight, bias)?;
        info!(
            path = %path.display(),
            input_dim = extractor.input_dim,
            output_dim = extractor.output_dim,
            "Loaded linear extractor"
        );
        Ok(extractor)
    }

    /// Download a safetensors file from the Hugging Face Hub, then load it
    pub fn from_hub(repo_id: &str, filename: &str, revision: Option<&str>) -> Result<Self> {
        let api = Api::new()
            .map_err(|e| Error::extractor(format!("Failed to initialize HF API: {e}")))?;
        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.unwrap_or("main").to_string(),
        ));
        let path = repo
            .get(filename)
            .map_err(|e| Error::extractor(format!("Failed to download {filename} from {repo_id}: {e}")))?;
        Self::load(&path)
    }

    /// Random projection with `N(0, 1/input_dim)` weights and zero bias
    pub fn seeded(input_dim: usize, output_dim: usize, seed: u64) -> Result<Self> {
        if input_dim == 0 || output_dim == 0 {
            return Err(Error::config("seeded projection needs non-zero dimensions"));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scale = 1.0 / (input_dim as f32).sqrt();
        let values: Vec<f32> = (0..input_dim * output_dim)
            .map(|_| {
                let z: f32 = StandardNormal.sample(&mut rng);
                z * scale
            })
            .collect();

        let weight = Tensor::from_vec(values, (output_dim, input_dim), &Device::Cpu)
            .map_err(candle_error)?;
        let bias = Tensor::zeros(output_dim, DType::F32, &Device::Cpu).map_err(candle_error)?;
        debug!(input_dim, output_dim, seed, "Initialised seeded projection");
        Self::from_tensors(weight, Some(bias))
    }

    /// Resolve weights from their configured source
    ///
    /// Seeded weights have no stored shape, so both dimensions must be given.
    pub fn from_weights(
        weights: &ExtractorWeights,
        input_dim: Option<usize>,
        output_dim: Option<usize>,
    ) -> Result<Self> {
        let extractor = match weights {
            ExtractorWeights::Local { path } => Self::load(path)?,
            ExtractorWeights::HuggingFace {
                repo_id,
                filename,
                revision,
            } => Self::from_hub(repo_id, filename, revision.as_deref())?,
            ExtractorWeights::Seeded { seed } => match (input_dim, output_dim) {
                (Some(i), Some(o)) => Self::seeded(i, o, *seed)?,
                _ => {
                    return Err(Error::config(
                        "seeded linear extractor needs input_dim and output_dim",
                    ))
                }
            },
        };

        if let Some(expected) = input_dim {
            if expected != extractor.input_dim {
                return Err(Error::shape_mismatch(
                    "linear extractor input_dim",
                    expected,
                    extractor.input_dim,
                ));
            }
        }
        if let Some(expected) = output_dim {
            if expected != extractor.output_dim {
                return Err(Error::shape_mismatch(
                    "linear extractor output_dim",
                    expected,
                    extractor.output_dim,
                ));
            }
        }
        Ok(extractor)
    }

    /// Apply ReLU after the projection
    pub fn with_relu(mut self, relu: bool) -> Self {
        self.relu = relu;
        self
    }

    /// Scale every embedding to unit norm
    pub fn with_l2_normalize(mut self, l2_normalize: bool) -> Self {
        self.l2_normalize = l2_normalize;
        self
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Write the projection to a safetensors file
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut tensors = HashMap::new();
        tensors.insert("weight".to_string(), self.layer.weight().clone());
        if let Some(bias) = self.layer.bias() {
            tensors.insert("bias".to_string(), bias.clone());
        }
        candle_core::safetensors::save(&tensors, path).map_err(candle_error)
    }
}

impl FeatureExtractor for LinearExtractor {
    fn name(&self) -> &str {
        "linear"
    }

    fn output_dim(&self) -> Option<usize> {
        Some(self.output_dim)
    }

    fn extract(&self, batch: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut flat = Vec::with_capacity(batch.len() * self.input_dim);
        for (i, row) in batch.iter().enumerate() {
            if row.len() != self.input_dim {
                return Err(Error::shape_mismatch(
                    format!("linear extractor input {i}"),
                    self.input_dim,
                    row.len(),
                ));
            }
            flat.extend_from_slice(row);
        }

        let input = Tensor::from_vec(flat, (batch.len(), self.input_dim), &self.device)
            .map_err(candle_error)?;
        let mut output = self.layer.forward(&input).map_err(candle_error)?;
        if self.relu {
            output = output.relu().map_err(candle_error)?;
        }
        let mut rows: Vec<Vec<f32>> = output.to_vec2().map_err(candle_error)?;

        if self.l2_normalize {
            for row in &mut rows {
                let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|v| *v /= norm);
                }
            }
        }
        Ok(rows)
    }
}

fn candle_error(e: candle_core::Error) -> Error {
    Error::extractor(e.to_string())
}
