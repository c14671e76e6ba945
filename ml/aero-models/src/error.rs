//! Error types for aero-models crate.

use aero_types::TypesError;
use thiserror::Error;

/// Errors that can occur in aero-models operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No model stored under the key.
    #[error("model not found: {0}")]
    NotFound(String),

    /// Stored blob could not be decoded, or describes a different topology.
    #[error("failed to deserialize model {key}: {reason}")]
    Deserialization {
        /// Store key.
        key: String,
        /// Reason for failure.
        reason: String,
    },

    /// Model could not be encoded or written to the store.
    #[error("failed to persist model {key}: {reason}")]
    Persistence {
        /// Store key.
        key: String,
        /// Reason for failure.
        reason: String,
    },

    /// Store key is empty or contains a path separator.
    #[error("invalid model key: {0:?}")]
    InvalidKey(String),

    /// Invalid model configuration.
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// Shape mismatch during inference.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape.
        expected: String,
        /// Actual shape.
        actual: String,
    },

    /// Forward pass or tensor readback failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ModelError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Creates a deserialization error.
    #[must_use]
    pub fn deserialization(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Deserialization {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Persistence {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid key error.
    #[must_use]
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// Creates an invalid config error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an inference error.
    #[must_use]
    pub fn inference(reason: impl Into<String>) -> Self {
        Self::Inference(reason.into())
    }
}

impl From<TypesError> for ModelError {
    fn from(err: TypesError) -> Self {
        Self::Inference(err.to_string())
    }
}

/// Result type for aero-models operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_not_found() {
        let err = ModelError::not_found("missing");
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn error_deserialization() {
        let err = ModelError::deserialization("m", "bad magic");
        assert!(err.to_string().contains("deserialize model m"));
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn error_persistence() {
        let err = ModelError::persistence("m", "disk full");
        assert!(err.to_string().contains("persist"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn error_invalid_key() {
        let err = ModelError::invalid_key("a/b");
        assert!(err.to_string().contains("\"a/b\""));
    }

    #[test]
    fn error_shape_mismatch() {
        let err = ModelError::shape_mismatch("[1, 224, 224, 3]", "[1, 8, 8, 3]");
        assert!(err.to_string().contains("224"));
    }

    #[test]
    fn error_from_types_error() {
        let err: ModelError = TypesError::data_size_mismatch(6, 4).into();
        assert!(matches!(err, ModelError::Inference(_)));
    }
}
