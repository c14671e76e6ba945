//! End-to-end training from captured frames.
//!
//! [`TrainingPipeline::run`] turns frames and one-hot labels into a trained,
//! stored model: preprocess, augment, shuffle, split, train, save. Progress
//! and user-facing events are published while it runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use aero_dataset::{AugmentConfig, Dataset, DatasetError, Preprocessor};
use aero_models::{DroneNetConfig, ModelStore};
use aero_types::{Frame, LogEvent, LogSink, Matrix};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info};

use crate::config::TrainingConfig;
use crate::error::{Result, TrainingError};
use crate::metrics::{ModelMetrics, TrainingReport};
use crate::trainer::Trainer;

/// Trains a fresh model on a labelled frame corpus and saves it.
pub struct TrainingPipeline {
    store: Arc<dyn ModelStore>,
    log: Arc<dyn LogSink>,
    input_height: usize,
    input_width: usize,
    augment: AugmentConfig,
    progress: AtomicU8,
    running: AtomicBool,
    last_error: Mutex<Option<String>>,
    trainer: RwLock<Option<Arc<Trainer>>>,
}

impl fmt::Debug for TrainingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingPipeline")
            .field("store", &self.store)
            .field("input_height", &self.input_height)
            .field("input_width", &self.input_width)
            .field("augment", &self.augment)
            .field("progress", &self.progress())
            .field("running", &self.is_training())
            .finish_non_exhaustive()
    }
}

impl TrainingPipeline {
    /// Creates a pipeline with the default model input size and augmentation.
    #[must_use]
    pub fn new(store: Arc<dyn ModelStore>, log: Arc<dyn LogSink>) -> Self {
        let defaults = DroneNetConfig::default();
        Self {
            store,
            log,
            input_height: defaults.input_height,
            input_width: defaults.input_width,
            augment: AugmentConfig::default(),
            progress: AtomicU8::new(0),
            running: AtomicBool::new(false),
            last_error: Mutex::new(None),
            trainer: RwLock::new(None),
        }
    }

    /// Sets the model input size frames are resized to.
    #[must_use]
    pub const fn with_input_size(mut self, height: usize, width: usize) -> Self {
        self.input_height = height;
        self.input_width = width;
        self
    }

    /// Sets the augmentation applied before training.
    #[must_use]
    pub fn with_augmentation(mut self, augment: AugmentConfig) -> Self {
        self.augment = augment;
        self
    }

    /// Percentage of the current or last run, `0..=100`.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    /// Returns `true` while [`TrainingPipeline::run`] is in progress.
    #[must_use]
    pub fn is_training(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Message of the last failed run, cleared when a new run starts.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Metrics of the current or last run.
    #[must_use]
    pub fn metrics(&self) -> Vec<ModelMetrics> {
        self.trainer
            .read()
            .as_ref()
            .map(|t| t.metrics())
            .unwrap_or_default()
    }

    /// Trainer of the current or last run.
    #[must_use]
    pub fn trainer(&self) -> Option<Arc<Trainer>> {
        self.trainer.read().clone()
    }

    /// Trains a new model on `frames` and saves it under `config.model_slot`.
    ///
    /// `labels` holds one one-hot row per frame; the row width sets the
    /// number of output classes.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Dataset`] for an empty or inconsistent
    /// corpus, [`TrainingError::AlreadyRunning`] if a run is active, and any
    /// error from training or saving.
    pub async fn run(
        &self,
        frames: &[Frame],
        labels: &[Vec<f32>],
        config: &TrainingConfig,
    ) -> Result<TrainingReport> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(TrainingError::AlreadyRunning);
        }
        let _running = RunFlag(&self.running);
        self.progress.store(0, Ordering::Release);
        *self.last_error.lock() = None;
        self.log
            .emit(LogEvent::info(format!("Starting training on {} frames", frames.len())));

        let outcome = self.run_inner(frames, labels, config).await;
        match &outcome {
            Ok(report) => {
                self.progress.store(100, Ordering::Release);
                info!(slot = %config.model_slot, "{}", report.summary());
            }
            Err(e) => {
                error!(error = %e, "training failed");
                self.log.emit(LogEvent::error(format!("Training failed: {e}")));
                *self.last_error.lock() = Some(e.to_string());
            }
        }
        outcome
    }

    async fn run_inner(
        &self,
        frames: &[Frame],
        labels: &[Vec<f32>],
        config: &TrainingConfig,
    ) -> Result<TrainingReport> {
        config.validate()?;
        let fraction = config.split_fraction()?;
        let num_classes = label_width(frames, labels)?;
        let model_config =
            DroneNetConfig::new(num_classes).with_input_size(self.input_height, self.input_width);

        let mut preprocessor = Preprocessor::new(config.seed);
        let images = Preprocessor::frames_to_batch(frames, self.input_height, self.input_width)?;
        let images = preprocessor.augment_with(&images, &self.augment)?;
        let dataset = Dataset::new(images, Matrix::from_rows(labels)?)?;
        let (train, validation) =
            preprocessor.shuffle_and_split(&dataset, config.shuffle_buffer, fraction)?;
        info!(
            train = train.len(),
            validation = validation.len(),
            classes = num_classes,
            "prepared dataset"
        );

        let trainer = Arc::new(Trainer::new(model_config, Arc::clone(&self.store))?);
        *self.trainer.write() = Some(Arc::clone(&trainer));

        let mut handle = trainer.spawn_training(train, validation, config)?;
        while let Some(metrics) = handle.next_epoch().await {
            self.progress
                .store(epoch_progress(metrics.epoch, config.epochs), Ordering::Release);
            self.log.emit(LogEvent::info(metrics.to_string()));
        }
        let report = handle.finish().await?;

        trainer.save_model(&config.model_slot).await?;
        self.log
            .emit(LogEvent::success(format!("Model saved as {}", config.model_slot)));
        Ok(report)
    }
}

/// Clears the pipeline's running flag, including when the run future is dropped.
struct RunFlag<'a>(&'a AtomicBool);

impl Drop for RunFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Checks the corpus and returns the shared label width.
fn label_width(frames: &[Frame], labels: &[Vec<f32>]) -> Result<usize> {
    if frames.is_empty() {
        return Err(DatasetError::EmptyDataset.into());
    }
    if labels.len() != frames.len() {
        return Err(DatasetError::label_mismatch(frames.len(), labels.len()).into());
    }
    let width = labels[0].len();
    if width == 0 {
        return Err(TrainingError::invalid_config("labels must have at least one class"));
    }
    if let Some(row) = labels.iter().position(|l| l.len() != width) {
        return Err(DatasetError::input_shape(format!(
            "label row {row} has {} classes, expected {width}",
            labels[row].len()
        ))
        .into());
    }
    Ok(width)
}

/// Progress after `epoch` (zero-based); 100 is reserved for a saved model.
#[allow(clippy::cast_possible_truncation)]
fn epoch_progress(epoch: usize, total: usize) -> u8 {
    ((epoch + 1) * 100 / total.max(1)).min(99) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use aero_models::MemoryStore;
    use aero_types::MemorySink;

    use super::*;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::solid(i as u64, 0.0, 4, 4, [255, 0, 0, 255]))
            .collect()
    }

    #[test]
    fn label_width_checks() {
        assert_eq!(label_width(&frames(2), &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap(), 2);
        assert!(matches!(
            label_width(&[], &[]),
            Err(TrainingError::Dataset(DatasetError::EmptyDataset))
        ));
        assert!(matches!(
            label_width(&frames(2), &[vec![1.0, 0.0]]),
            Err(TrainingError::Dataset(DatasetError::LabelMismatch { images: 2, labels: 1 }))
        ));
        assert!(matches!(
            label_width(&frames(2), &[vec![1.0, 0.0], vec![1.0]]),
            Err(TrainingError::Dataset(DatasetError::InputShape(_)))
        ));
        assert!(matches!(
            label_width(&frames(1), &[vec![]]),
            Err(TrainingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn progress_reserves_completion() {
        assert_eq!(epoch_progress(0, 4), 25);
        assert_eq!(epoch_progress(3, 4), 99);
        assert_eq!(epoch_progress(0, 0), 99);
    }

    #[tokio::test]
    async fn failed_run_is_reported() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = TrainingPipeline::new(Arc::new(MemoryStore::new()), sink.clone())
            .with_input_size(4, 4);
        let err = pipeline
            .run(&frames(2), &[vec![1.0]], &TrainingConfig::new(1, 2, 0.01))
            .await
            .unwrap_err();

        assert!(matches!(err, TrainingError::Dataset(_)));
        assert!(pipeline.last_error().is_some());
        assert!(!pipeline.is_training());
        assert!(sink.contains_level(aero_types::LogLevel::Error));
    }
}
