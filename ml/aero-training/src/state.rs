//! Epoch bookkeeping and early stopping.

use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;

/// Progress of a training run.
///
/// # Example
///
/// ```
/// use aero_training::TrainingState;
///
/// let mut state = TrainingState::new(10, 2, 0.0);
/// assert!(state.record_val_loss(1.0));
/// assert!(!state.record_val_loss(1.0));
/// assert!(!state.record_val_loss(1.2));
/// assert!(state.should_early_stop());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Epochs completed so far.
    pub epoch: usize,

    /// Total epochs to run.
    pub total_epochs: usize,

    /// Best validation loss seen.
    pub best_val_loss: Option<f32>,

    /// Consecutive epochs without improvement.
    pub epochs_without_improvement: usize,

    /// Early stopping patience (0 = disabled).
    pub patience: usize,

    /// Minimum decrease that counts as an improvement.
    pub min_delta: f32,

    /// Whether early stopping fired.
    pub early_stopped: bool,
}

impl TrainingState {
    /// Creates a fresh state.
    #[must_use]
    pub const fn new(total_epochs: usize, patience: usize, min_delta: f32) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            best_val_loss: None,
            epochs_without_improvement: 0,
            patience,
            min_delta,
            early_stopped: false,
        }
    }

    /// Creates a state for the given config.
    #[must_use]
    pub const fn from_config(config: &TrainingConfig) -> Self {
        Self::new(
            config.epochs,
            config.early_stopping_patience,
            config.early_stopping_min_delta,
        )
    }

    /// Returns `true` once all epochs ran or early stopping fired.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.early_stopped || self.epoch >= self.total_epochs
    }

    /// Returns the fraction of epochs completed, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f32 {
        if self.total_epochs == 0 || self.early_stopped {
            1.0
        } else {
            (self.epoch as f32 / self.total_epochs as f32).min(1.0)
        }
    }

    /// Marks one more epoch as completed.
    pub const fn next_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Records a validation loss; returns `true` if it is a new best.
    ///
    /// A loss counts as an improvement when it is lower than the best by more
    /// than `min_delta`. A non-finite loss never improves.
    pub fn record_val_loss(&mut self, val_loss: f32) -> bool {
        let improved = val_loss.is_finite()
            && self
                .best_val_loss
                .is_none_or(|best| val_loss < best - self.min_delta);

        if improved {
            self.best_val_loss = Some(val_loss);
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;
        }
        improved
    }

    /// Checks if early stopping should trigger.
    #[must_use]
    pub const fn should_early_stop(&self) -> bool {
        self.patience > 0 && self.epochs_without_improvement >= self.patience
    }

    /// Marks the run as early stopped.
    pub const fn early_stop(&mut self) {
        self.early_stopped = true;
    }
}
