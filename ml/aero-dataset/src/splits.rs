//! Train / validation partitioning.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{DatasetError, Result};

/// Fraction of a dataset held out for validation.
///
/// # Example
///
/// ```
/// use aero_dataset::ValidationFraction;
///
/// let fraction = ValidationFraction::new(0.2).unwrap();
/// assert_eq!(fraction.validation_count(10), 2);
/// assert_eq!(fraction.validation_count(4), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ValidationFraction(f64);

impl ValidationFraction {
    /// Creates a validation fraction.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidSplitFraction`] unless `fraction` is in
    /// `(0, 1)`.
    pub fn new(fraction: f64) -> Result<Self> {
        if fraction > 0.0 && fraction < 1.0 {
            Ok(Self(fraction))
        } else {
            Err(DatasetError::InvalidSplitFraction(fraction))
        }
    }

    /// Returns the fraction.
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Number of validation samples for a dataset of `total` samples: `floor(total * fraction)`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn validation_count(self, total: usize) -> usize {
        ((total as f64 * self.0).floor() as usize).min(total)
    }

    /// The default 20% hold-out.
    pub const TWENTY_PERCENT: Self = Self(0.2);
}

impl Default for ValidationFraction {
    fn default() -> Self {
        Self::TWENTY_PERCENT
    }
}

impl TryFrom<f64> for ValidationFraction {
    type Error = DatasetError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ValidationFraction> for f64 {
    fn from(value: ValidationFraction) -> Self {
        value.0
    }
}

/// Splits a dataset into `(train, validation)`.
///
/// The last `floor(n * fraction)` samples form the validation set and the
/// rest the training set, both in their original order. Shuffle first if the
/// input is ordered. An empty dataset yields two empty partitions.
///
/// # Errors
///
/// Propagates slicing errors.
pub fn split_dataset(dataset: &Dataset, fraction: ValidationFraction) -> Result<(Dataset, Dataset)> {
    let total = dataset.len();
    let train_len = total - fraction.validation_count(total);
    let train = dataset.slice(0..train_len)?;
    let validation = dataset.slice(train_len..total)?;
    tracing::debug!(
        train = train.len(),
        validation = validation.len(),
        "split dataset"
    );
    Ok((train, validation))
}
