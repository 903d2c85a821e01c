//! Sample transforms
//!
//! Transforms are pure functions of one raw sample. The provider transform
//! produces the feature extractor's input; the downstream transform produces
//! a task feature vector and class label for the utility metrics.

use crate::provider::Sample;
use serde::{Deserialize, Serialize};
use simet_core::{Error, Result};

/// Raw sample to extractor input
pub trait ProviderTransform: Send + Sync {
    fn apply(&self, sample: &Sample) -> Result<Vec<f32>>;
}

/// Raw sample to `(task features, class index)`
pub trait DownstreamTransform: Send + Sync {
    fn apply(&self, sample: &Sample) -> Result<(Vec<f32>, usize)>;
}

/// How raw bytes become numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoding {
    /// Little-endian `f32` words
    #[default]
    F32Le,

    /// One value per byte, scaled to `[0, 1]`
    U8,

    /// UTF-8 decimal numbers separated by whitespace or commas
    Text,
}

impl Decoding {
    /// Decode raw bytes into values
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let values = match self {
            Self::F32Le => {
                if bytes.len() % 4 != 0 {
                    return Err(Error::transform(format!(
                        "f32 payload length {} is not a multiple of 4",
                        bytes.len()
                    )));
                }
                bytes
                    .chunks_exact(4)
                    .map(|w| f32::from_le_bytes([w[0], w[1], w[2], w[3]]))
                    .collect()
            }
            Self::U8 => bytes.iter().map(|&b| f32::from(b) / 255.0).collect(),
            Self::Text => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| Error::transform(format!("text payload is not UTF-8: {e}")))?;
                text.split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|t| !t.is_empty())
                    .map(|t| {
                        t.parse::<f32>()
                            .map_err(|_| Error::transform(format!("'{t}' is not a number")))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::transform("decoded payload contains non-finite values"));
        }
        Ok(values)
    }
}

/// One element-wise processing step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Truncate or zero-pad to `len`
    Resize { len: usize },

    /// Multiply every value by `factor`
    Scale { factor: f32 },

    /// `(x - mean) / std`
    Normalize { mean: f32, std: f32 },

    /// Scale to unit Euclidean norm; zero vectors are left as is
    L2Normalize,
}

impl Step {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Scale { factor } if !factor.is_finite() => {
                Err(Error::config("scale factor must be finite"))
            }
            Self::Normalize { mean, std } if !(mean.is_finite() && std.is_finite() && *std > 0.0) => {
                Err(Error::config(format!(
                    "normalize needs finite mean and std > 0, got mean={mean} std={std}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, values: &mut Vec<f32>) -> Result<()> {
        self.validate().map_err(|e| Error::transform(e.to_string()))?;
        match *self {
            Self::Resize { len } => values.resize(len, 0.0),
            Self::Scale { factor } => values.iter_mut().for_each(|v| *v *= factor),
            Self::Normalize { mean, std } => values.iter_mut().for_each(|v| *v = (*v - mean) / std),
            Self::L2Normalize => {
                let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    values.iter_mut().for_each(|v| *v /= norm);
                }
            }
        }
        Ok(())
    }
}

/// Decode then apply steps in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorTransform {
    #[serde(default)]
    pub decoding: Decoding,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl TensorTransform {
    pub fn new(decoding: Decoding) -> Self {
        Self {
            decoding,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.steps.iter().try_for_each(Step::validate)
    }

    /// Decode and process raw bytes
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let mut values = self.decoding.decode(bytes)?;
        for step in &self.steps {
            step.apply(&mut values)?;
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::transform("transform produced non-finite values"));
        }
        Ok(values)
    }
}

impl ProviderTransform for TensorTransform {
    fn apply(&self, sample: &Sample) -> Result<Vec<f32>> {
        self.process(&sample.bytes)
            .map_err(|e| Error::transform(format!("sample {}: {e}", sample.index)))
    }
}

/// How sample labels map to class indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelEncoding {
    /// Index of the label in this list
    Named(Vec<String>),

    /// The label itself is a non-negative integer
    Numeric,
}

impl LabelEncoding {
    pub fn encode(&self, label: &str) -> Result<usize> {
        match self {
            Self::Named(classes) => classes
                .iter()
                .position(|c| c == label)
                .ok_or_else(|| Error::transform(format!("unknown class '{label}'"))),
            Self::Numeric => label
                .trim()
                .parse()
                .map_err(|_| Error::transform(format!("label '{label}' is not a class index"))),
        }
    }
}

/// Task features from a tensor transform, class from the sample label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDownstreamTransform {
    #[serde(flatten)]
    pub features: TensorTransform,

    pub labels: LabelEncoding,
}

impl SampleDownstreamTransform {
    pub fn new(features: TensorTransform, labels: LabelEncoding) -> Self {
        Self { features, labels }
    }
}

impl DownstreamTransform for SampleDownstreamTransform {
    fn apply(&self, sample: &Sample) -> Result<(Vec<f32>, usize)> {
        let label = sample
            .label
            .as_deref()
            .ok_or_else(|| Error::transform(format!("sample {} has no label", sample.index)))?;
        let class = self
            .labels
            .encode(label)
            .map_err(|e| Error::transform(format!("sample {}: {e}", sample.index)))?;
        let features = self.features.apply(sample)?;
        Ok((features, class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::encode_f32_le;

    #[test]
    fn test_f32_decoding() {
        let bytes = encode_f32_le(&[1.5, -2.0, 0.25]);
        assert_eq!(Decoding::F32Le.decode(&bytes).unwrap(), vec![1.5, -2.0, 0.25]);
        assert!(Decoding::F32Le.decode(&bytes[..5]).is_err());
    }

    #[test]
    fn test_u8_and_text_decoding() {
        assert_eq!(Decoding::U8.decode(&[0, 255]).unwrap(), vec![0.0, 1.0]);
        assert_eq!(
            Decoding::Text.decode(b"1, 2.5\n-3").unwrap(),
            vec![1.0, 2.5, -3.0]
        );
        assert!(Decoding::Text.decode(b"1 two").is_err());
        assert!(Decoding::Text.decode(b"1 NaN").is_err());
    }

    #[test]
    fn test_steps_apply_in_order() {
        let transform = TensorTransform::new(Decoding::Text)
            .with_step(Step::Resize { len: 4 })
            .with_step(Step::Normalize { mean: 1.0, std: 2.0 })
            .with_step(Step::Scale { factor: 2.0 });

        let out = transform.process(b"3 5").unwrap();
        assert_eq!(out, vec![2.0, 4.0, -1.0, -1.0]);
    }

    #[test]
    fn test_l2_normalize() {
        let mut values = vec![3.0, 4.0];
        Step::L2Normalize.apply(&mut values).unwrap();
        assert_eq!(values, vec![0.6, 0.8]);

        let mut zeros = vec![0.0, 0.0];
        Step::L2Normalize.apply(&mut zeros).unwrap();
        assert_eq!(zeros, vec![0.0, 0.0]);
    }

    #[test]
    fn test_zero_std_rejected() {
        let transform = TensorTransform::default().with_step(Step::Normalize { mean: 0.0, std: 0.0 });
        assert!(transform.validate().is_err());
    }

    #[test]
    fn test_downstream_labels() {
        let transform = SampleDownstreamTransform::new(
            TensorTransform::new(Decoding::Text),
            LabelEncoding::Named(vec!["cat".into(), "dog".into()]),
        );
        let sample = Sample::new(0, &b"1 2"[..]).with_label("dog");
        assert_eq!(transform.apply(&sample).unwrap(), (vec![1.0, 2.0], 1));

        let unknown = Sample::new(1, &b"1 2"[..]).with_label("bird");
        assert!(matches!(transform.apply(&unknown).unwrap_err(), Error::Transform(_)));

        let unlabelled = Sample::new(2, &b"1 2"[..]);
        assert!(transform.apply(&unlabelled).is_err());
    }

    #[test]
    fn test_numeric_labels() {
        assert_eq!(LabelEncoding::Numeric.encode("3").unwrap(), 3);
        assert!(LabelEncoding::Numeric.encode("-1").is_err());
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = r#"
decoding: text
steps:
  - resize: { len: 8 }
  - normalize: { mean: 0.5, std: 0.25 }
  - l2_normalize
labels:
  named: [cat, dog]
"#;
        let transform: SampleDownstreamTransform = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(transform.features.decoding, Decoding::Text);
        assert_eq!(transform.features.steps.len(), 3);
        assert_eq!(transform.features.steps[2], Step::L2Normalize);
        assert_eq!(transform.labels, LabelEncoding::Named(vec!["cat".into(), "dog".into()]));
    }
}
