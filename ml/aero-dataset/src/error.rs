//! Error types for aero-dataset crate.

use aero_types::TypesError;
use thiserror::Error;

/// Errors that can occur in aero-dataset operations.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Input images or parameters have an unusable shape.
    #[error("input shape error: {0}")]
    InputShape(String),

    /// Validation fraction outside `(0, 1)`.
    #[error("invalid split fraction: {0} (must be in (0, 1))")]
    InvalidSplitFraction(f64),

    /// Image and label counts differ.
    #[error("label count mismatch: {images} images, {labels} labels")]
    LabelMismatch {
        /// Number of images.
        images: usize,
        /// Number of label rows.
        labels: usize,
    },

    /// Empty dataset where one is required.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Tensor construction failed.
    #[error(transparent)]
    Types(#[from] TypesError),
}

impl DatasetError {
    /// Creates an input shape error.
    #[must_use]
    pub fn input_shape(reason: impl Into<String>) -> Self {
        Self::InputShape(reason.into())
    }

    /// Creates a label mismatch error.
    #[must_use]
    pub const fn label_mismatch(images: usize, labels: usize) -> Self {
        Self::LabelMismatch { images, labels }
    }
}

/// Result type for aero-dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
