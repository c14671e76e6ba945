//! Error types for aero-training crate.

use aero_dataset::DatasetError;
use aero_models::ModelError;
use aero_types::TypesError;
use thiserror::Error;

/// Errors that can occur during training.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Invalid training configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input data could not be prepared.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Model construction, inference or persistence failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Training loss became NaN or infinite.
    #[error("training diverged at epoch {epoch}: loss {loss}")]
    Diverged {
        /// Epoch (0-indexed) in which the loss became non-finite.
        epoch: usize,
        /// The offending loss value.
        loss: f32,
    },

    /// Training was cancelled.
    #[error("training cancelled after {completed_epochs} completed epochs")]
    Cancelled {
        /// Epochs fully completed before cancellation.
        completed_epochs: usize,
    },

    /// A training run is already in progress on this trainer.
    #[error("a training run is already in progress")]
    AlreadyRunning,

    /// Background task failed or no runtime was available.
    #[error("training worker failed: {0}")]
    Worker(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
}

impl TrainingError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Creates a worker error.
    #[must_use]
    pub fn worker(reason: impl Into<String>) -> Self {
        Self::Worker(reason.into())
    }

    /// Returns `true` for [`TrainingError::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<std::io::Error> for TrainingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TrainingError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<TypesError> for TrainingError {
    fn from(err: TypesError) -> Self {
        Self::Dataset(DatasetError::Types(err))
    }
}

/// Result type for training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;
