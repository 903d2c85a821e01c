//! Error types for simet

/// Result type alias using simet's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for simet operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A data source does not exist or holds no samples
    #[error("not found: {0}")]
    NotFound(String),

    /// Read failures from a provider
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Dimensionality disagreement between populations, values or bounds
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// An algorithm needs more samples than were provided
    #[error("insufficient samples for {context}: need at least {required}, found {found}")]
    InsufficientSamples {
        context: String,
        required: usize,
        found: usize,
    },

    /// Non-convergent or ill-conditioned numerics
    #[error("numeric instability: {0}")]
    NumericInstability(String),

    /// Malformed input data (non-finite values, ragged rows)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Sample transform failures
    #[error("transform error: {0}")]
    Transform(String),

    /// Feature extractor failures
    #[error("feature extractor error: {0}")]
    Extractor(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pipeline stage failed; wraps the underlying cause
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<Error>,
    },

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new shape mismatch error
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a new insufficient samples error
    pub fn insufficient_samples(context: impl Into<String>, required: usize, found: usize) -> Self {
        Self::InsufficientSamples {
            context: context.into(),
            required,
            found,
        }
    }

    /// Create a new numeric instability error
    pub fn numeric(msg: impl Into<String>) -> Self {
        Self::NumericInstability(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new transform error
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a new extractor error
    pub fn extractor(msg: impl Into<String>) -> Self {
        Self::Extractor(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap this error with the name of the stage that produced it
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any stage wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Name of the outermost failing stage, if any
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_stages() {
        let err = Error::insufficient_samples("knn", 6, 3)
            .in_stage("precision_recall")
            .in_stage("pipeline");

        assert_eq!(err.stage(), Some("pipeline"));
        assert!(matches!(
            err.root_cause(),
            Error::InsufficientSamples { required: 6, found: 3, .. }
        ));
    }

    #[test]
    fn test_display_names_stage_and_reason() {
        let err = Error::numeric("jacobi did not converge").in_stage("fid");
        let msg = err.to_string();
        assert!(msg.contains("fid"));
        assert!(msg.contains("jacobi did not converge"));
    }
}
