//! Error types for aero-detect crate.

use aero_dataset::DatasetError;
use thiserror::Error;

/// Errors that can occur while loading or running a detector.
///
/// These are logged and degraded to an empty detection list by
/// [`crate::Detector::detect`] and [`crate::DetectionClient::detect`].
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Detection was requested before a model was loaded.
    #[error("no detection model is loaded")]
    ModelNotLoaded,

    /// Model could not be loaded.
    #[error("failed to load detection model: {0}")]
    ModelLoad(String),

    /// Preprocessing or the forward pass failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Worker has shut down or is unreachable.
    #[error("detection worker is closed")]
    WorkerClosed,

    /// No response arrived in time.
    #[error("detection request {request_id} timed out")]
    Timeout {
        /// Id of the abandoned request.
        request_id: u64,
    },
}

impl DetectionError {
    /// Creates a model load error.
    #[must_use]
    pub fn model_load(reason: impl Into<String>) -> Self {
        Self::ModelLoad(reason.into())
    }

    /// Creates an inference error.
    #[must_use]
    pub fn inference(reason: impl Into<String>) -> Self {
        Self::Inference(reason.into())
    }
}

impl From<DatasetError> for DetectionError {
    fn from(err: DatasetError) -> Self {
        Self::Inference(err.to_string())
    }
}

/// Result type for aero-detect operations.
pub type Result<T> = std::result::Result<T, DetectionError>;

#[cfg(test)]
mod tests {
    use aero_models::ModelError;

    use super::*;

    #[test]
    fn error_display() {
        assert!(DetectionError::ModelNotLoaded.to_string().contains("no detection model"));
        assert!(
            DetectionError::model_load("missing")
                .to_string()
                .contains("missing")
        );
        assert!(
            DetectionError::Timeout { request_id: 7 }
                .to_string()
                .contains('7')
        );
    }

    #[test]
    fn from_dataset_error() {
        let err: DetectionError = DatasetError::input_shape("zero width").into();
        assert!(matches!(err, DetectionError::Inference(_)));
    }

    #[test]
    fn model_error_maps_to_load() {
        let err = DetectionError::model_load(ModelError::not_found("m").to_string());
        assert!(err.to_string().contains("model not found"));
    }
}
