//! Training configuration.

use std::path::Path;

use aero_dataset::{DEFAULT_SHUFFLE_BUFFER, ValidationFraction};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainingError};

/// Store slot the training pipeline saves to.
pub const DEFAULT_MODEL_SLOT: &str = "drone-detection-model";

/// Configuration for a training run.
///
/// Only `epochs`, `batch_size` and `learning_rate` are required when
/// deserializing; everything else falls back to its default.
///
/// # Example
///
/// ```
/// use aero_training::TrainingConfig;
///
/// let config = TrainingConfig::new(10, 32, 1e-3);
/// assert_eq!(config.early_stopping_patience, 5);
/// assert!(config.is_valid());
///
/// let parsed = TrainingConfig::from_json(r#"{"epochs": 3, "batch_size": 8, "learning_rate": 0.01}"#)
///     .unwrap();
/// assert_eq!(parsed.shuffle_buffer, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Maximum number of epochs.
    pub epochs: usize,

    /// Mini-batch size.
    pub batch_size: usize,

    /// Adam learning rate.
    pub learning_rate: f32,

    /// Adam moment parameters.
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Epochs without validation-loss improvement before stopping (0 = disabled).
    #[serde(default = "default_patience")]
    pub early_stopping_patience: usize,

    /// Minimum validation-loss decrease that counts as an improvement.
    #[serde(default)]
    pub early_stopping_min_delta: f32,

    /// Fraction of the corpus held out for validation.
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,

    /// Shuffle buffer size.
    #[serde(default = "default_shuffle_buffer")]
    pub shuffle_buffer: usize,

    /// Random seed for augmentation and shuffling.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Store key the trained model is saved under.
    #[serde(default = "default_model_slot")]
    pub model_slot: String,
}

const fn default_patience() -> usize {
    5
}

const fn default_validation_fraction() -> f64 {
    0.2
}

const fn default_shuffle_buffer() -> usize {
    DEFAULT_SHUFFLE_BUFFER
}

fn default_model_slot() -> String {
    DEFAULT_MODEL_SLOT.to_string()
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(50, 32, 1e-3)
    }
}

impl TrainingConfig {
    /// Creates a config with the given epochs, batch size and learning rate.
    #[must_use]
    pub fn new(epochs: usize, batch_size: usize, learning_rate: f32) -> Self {
        Self {
            epochs,
            batch_size,
            learning_rate,
            optimizer: OptimizerConfig::default(),
            early_stopping_patience: default_patience(),
            early_stopping_min_delta: 0.0,
            validation_fraction: default_validation_fraction(),
            shuffle_buffer: DEFAULT_SHUFFLE_BUFFER,
            seed: None,
            model_slot: default_model_slot(),
        }
    }

    /// Sets the optimizer parameters.
    #[must_use]
    pub const fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Sets early stopping patience.
    #[must_use]
    pub const fn with_patience(mut self, patience: usize) -> Self {
        self.early_stopping_patience = patience;
        self
    }

    /// Sets the minimum improvement for early stopping.
    #[must_use]
    pub const fn with_min_delta(mut self, min_delta: f32) -> Self {
        self.early_stopping_min_delta = min_delta;
        self
    }

    /// Sets the validation fraction.
    #[must_use]
    pub const fn with_validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = fraction;
        self
    }

    /// Sets the shuffle buffer size.
    #[must_use]
    pub const fn with_shuffle_buffer(mut self, size: usize) -> Self {
        self.shuffle_buffer = size;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the model store slot.
    #[must_use]
    pub fn with_model_slot(mut self, slot: impl Into<String>) -> Self {
        self.model_slot = slot.into();
        self
    }

    /// Returns `true` if all values are usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TrainingError::invalid_config("epochs must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::invalid_config("batch_size must be > 0"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainingError::invalid_config(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.early_stopping_min_delta.is_finite() && self.early_stopping_min_delta >= 0.0) {
            return Err(TrainingError::invalid_config(
                "early_stopping_min_delta must be finite and >= 0",
            ));
        }
        if ValidationFraction::new(self.validation_fraction).is_err() {
            return Err(TrainingError::invalid_config(format!(
                "validation_fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        if self.model_slot.is_empty() {
            return Err(TrainingError::invalid_config("model_slot must not be empty"));
        }
        self.optimizer.validate()
    }

    /// Returns the validated hold-out fraction.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] if out of range.
    pub fn split_fraction(&self) -> Result<ValidationFraction> {
        ValidationFraction::new(self.validation_fraction)
            .map_err(|e| TrainingError::invalid_config(e.to_string()))
    }

    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] for malformed JSON or bad values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Io`] if the file cannot be read, otherwise as
    /// [`TrainingConfig::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Adam optimizer parameters.
///
/// # Example
///
/// ```
/// use aero_training::OptimizerConfig;
///
/// let adam = OptimizerConfig::default();
/// assert!((adam.beta1 - 0.9).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Exponential decay of the first moment.
    pub beta1: f32,

    /// Exponential decay of the second moment.
    pub beta2: f32,

    /// Denominator epsilon.
    pub epsilon: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

impl OptimizerConfig {
    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] unless both betas are in
    /// `[0, 1)` and epsilon is positive.
    pub fn validate(&self) -> Result<()> {
        let beta_ok = |b: f32| (0.0..1.0).contains(&b);
        if beta_ok(self.beta1) && beta_ok(self.beta2) && self.epsilon > 0.0 && self.epsilon.is_finite() {
            Ok(())
        } else {
            Err(TrainingError::invalid_config(format!("bad Adam parameters: {self:?}")))
        }
    }
}
