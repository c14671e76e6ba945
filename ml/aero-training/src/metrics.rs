//! Per-epoch metrics and run reports.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Metrics for one completed epoch.
///
/// `loss` and `accuracy` are always finite: a missing or non-finite source
/// value is recorded as `0.0`. The validation fields are `None` when no
/// validation set was evaluated.
///
/// # Example
///
/// ```
/// use aero_training::ModelMetrics;
///
/// let m = ModelMetrics::new(0, f32::NAN, 0.5, Some(0.7), None);
/// assert_eq!(m.loss, 0.0);
/// assert_eq!(m.val_loss, Some(0.7));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Epoch number (0-indexed).
    pub epoch: usize,

    /// Mean training loss.
    pub loss: f32,

    /// Training accuracy in `[0, 1]`.
    pub accuracy: f32,

    /// Validation loss, if computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f32>,

    /// Validation accuracy, if computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f32>,
}

impl ModelMetrics {
    /// Creates epoch metrics, coercing non-finite `loss` / `accuracy` to `0.0`.
    #[must_use]
    pub fn new(
        epoch: usize,
        loss: f32,
        accuracy: f32,
        val_loss: Option<f32>,
        val_accuracy: Option<f32>,
    ) -> Self {
        let finite_or_zero = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self {
            epoch,
            loss: finite_or_zero(loss),
            accuracy: finite_or_zero(accuracy),
            val_loss: val_loss.filter(|v| v.is_finite()),
            val_accuracy: val_accuracy.filter(|v| v.is_finite()),
        }
    }

    /// Returns `true` if validation metrics are present.
    #[must_use]
    pub const fn has_validation(&self) -> bool {
        self.val_loss.is_some()
    }
}

impl std::fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Epoch {}: loss = {:.4}, accuracy = {:.4}",
            self.epoch + 1,
            self.loss,
            self.accuracy
        )?;
        match (self.val_loss, self.val_accuracy) {
            (Some(l), Some(a)) => write!(f, ", val_loss = {l:.4}, val_accuracy = {a:.4}"),
            (Some(l), None) => write!(f, ", val_loss = {l:.4}"),
            _ => Ok(()),
        }
    }
}

/// Shared, append-only, epoch-ordered metrics list.
///
/// Clones share the same storage, so a reader can watch a run in progress.
#[derive(Debug, Clone, Default)]
pub struct MetricsHistory {
    entries: Arc<RwLock<Vec<ModelMetrics>>>,
}

impl MetricsHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an epoch.
    pub fn push(&self, metrics: ModelMetrics) {
        self.entries.write().push(metrics);
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ModelMetrics> {
        self.entries.read().clone()
    }

    /// Returns the most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<ModelMetrics> {
        self.entries.read().last().cloned()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no epoch has completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// All configured epochs ran.
    Completed,
    /// Validation loss stopped improving.
    EarlyStopped,
}

/// Outcome of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Metrics for every completed epoch, in order.
    pub metrics: Vec<ModelMetrics>,

    /// Why the run ended.
    pub stop_reason: StopReason,

    /// Lowest validation loss seen.
    pub best_val_loss: Option<f32>,

    /// Epoch of the lowest validation loss.
    pub best_epoch: Option<usize>,
}

impl TrainingReport {
    /// Builds a report from the epoch list.
    #[must_use]
    pub fn new(metrics: Vec<ModelMetrics>, stop_reason: StopReason) -> Self {
        let best = metrics
            .iter()
            .filter_map(|m| m.val_loss.map(|l| (m.epoch, l)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        Self {
            metrics,
            stop_reason,
            best_val_loss: best.map(|(_, l)| l),
            best_epoch: best.map(|(e, _)| e),
        }
    }

    /// Returns the number of completed epochs.
    #[must_use]
    pub fn epochs_completed(&self) -> usize {
        self.metrics.len()
    }

    /// Returns `true` if the run stopped early.
    #[must_use]
    pub fn early_stopped(&self) -> bool {
        self.stop_reason == StopReason::EarlyStopped
    }

    /// Returns the last epoch's metrics.
    #[must_use]
    pub fn final_metrics(&self) -> Option<&ModelMetrics> {
        self.metrics.last()
    }

    /// Returns a human-readable summary.
    #[must_use]
    #[allow(clippy::let_underscore_must_use)]
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();
        let _ = writeln!(s, "Epochs completed: {}", self.epochs_completed());
        if let Some(last) = self.final_metrics() {
            let _ = writeln!(s, "Final: {last}");
        }
        if let (Some(best), Some(epoch)) = (self.best_val_loss, self.best_epoch) {
            let _ = writeln!(s, "Best val loss: {best:.4} (epoch {})", epoch + 1);
        }
        if self.early_stopped() {
            let _ = writeln!(s, "Early stopped");
        }
        s
    }
}
