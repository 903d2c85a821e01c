//! simet Data
//!
//! Everything between raw sample files and the embeddings the restraints see:
//! - Providers that fetch raw samples (local directories, memory)
//! - Transforms that decode samples into model inputs and downstream task features
//! - Feature extractors (identity, frozen Candle linear projection)
//! - The dataset loader that composes them into a [`simet_core::LoadedDataset`]

pub mod config;
pub mod extractor;
pub mod loader;
pub mod provider;
pub mod transform;

pub use config::{ExtractorSpec, LoaderSpec, SourceSpec};
pub use extractor::{ExtractorWeights, FeatureExtractor, IdentityExtractor, LinearExtractor};
pub use loader::{DatasetLoader, DEFAULT_BATCH_SIZE};
pub use provider::{encode_f32_le, InMemoryProvider, LocalBinaryProvider, Provider, Sample};
pub use transform::{
    Decoding, DownstreamTransform, LabelEncoding, ProviderTransform, SampleDownstreamTransform,
    Step, TensorTransform,
};
