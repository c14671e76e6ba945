//! DroneNet training loop.
//!
//! A [`Trainer`] owns one model behind a mutex. Training runs on a blocking
//! background task; every optimizer step swaps the model under that mutex,
//! so [`Trainer::predict`] always sees a whole weight snapshot from before
//! or after a step. Per-epoch [`ModelMetrics`] are appended to a shared
//! [`MetricsHistory`] and streamed through a [`TrainingHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use aero_dataset::{Dataset, DatasetError};
use aero_models::{
    Device, DroneNet, DroneNetConfig, InferenceBackend, ModelError, ModelStore, TrainingBackend,
    batch_to_tensor, default_device, load_from_store, matrix_to_tensor, save_to_store,
};
use aero_types::{Batch, Matrix};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::tensor::activation::log_softmax;
use burn::tensor::{ElementConversion, Tensor};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TrainingConfig;
use crate::error::{Result, TrainingError};
use crate::metrics::{MetricsHistory, ModelMetrics, StopReason, TrainingReport};
use crate::state::TrainingState;

/// Buffered epochs between the training task and a slow [`TrainingHandle`] reader.
const METRICS_CHANNEL_CAPACITY: usize = 16;

type TrainModel = DroneNet<TrainingBackend>;

/// Runs after every optimizer step, with the model lock held.
#[cfg(test)]
#[derive(Clone)]
struct StepHook(Arc<dyn Fn(&mut TrainModel) + Send + Sync>);

/// Cooperative cancellation flag shared with a training task.
///
/// The task checks it before every mini-batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A running training task.
///
/// Yields each epoch's metrics in order. Dropping the handle lets the run
/// continue detached; its metrics still land in the trainer's history.
#[derive(Debug)]
pub struct TrainingHandle {
    metrics: mpsc::Receiver<ModelMetrics>,
    cancel: CancelToken,
    join: JoinHandle<Result<TrainingReport>>,
}

impl TrainingHandle {
    /// Waits for the next completed epoch; `None` once the run has ended.
    pub async fn next_epoch(&mut self) -> Option<ModelMetrics> {
        self.metrics.recv().await
    }

    /// Requests cancellation. The run stops before its next mini-batch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a token that cancels this run.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Returns `true` once the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Drains remaining epochs and waits for the run's outcome.
    ///
    /// # Errors
    ///
    /// Returns the run's error, or [`TrainingError::Worker`] if the task panicked.
    pub async fn finish(mut self) -> Result<TrainingReport> {
        while self.metrics.recv().await.is_some() {}
        self.join
            .await
            .map_err(|e| TrainingError::worker(e.to_string()))?
    }
}

/// Owns a trainable [`DroneNet`] and its metrics history.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use aero_models::{DroneNetConfig, MemoryStore};
/// use aero_training::Trainer;
///
/// let store = Arc::new(MemoryStore::new());
/// let trainer = Trainer::new(DroneNetConfig::new(2), store).unwrap();
/// assert!(trainer.metrics().is_empty());
/// ```
#[derive(Debug)]
pub struct Trainer {
    config: DroneNetConfig,
    model: Arc<Mutex<TrainModel>>,
    store: Arc<dyn ModelStore>,
    history: MetricsHistory,
    running: Arc<AtomicBool>,
    device: Device,
    #[cfg(test)]
    step_hook: Option<StepHook>,
}

#[cfg(test)]
impl std::fmt::Debug for StepHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StepHook")
    }
}

impl Trainer {
    /// Creates a trainer holding a freshly initialized model.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Model`] if `config` is invalid.
    pub fn new(config: DroneNetConfig, store: Arc<dyn ModelStore>) -> Result<Self> {
        config.validate()?;
        let device = default_device();
        let model = config.init::<TrainingBackend>(&device);
        debug!(?config, "initialized model");
        Ok(Self {
            config,
            model: Arc::new(Mutex::new(model)),
            store,
            history: MetricsHistory::new(),
            running: Arc::new(AtomicBool::new(false)),
            device,
            #[cfg(test)]
            step_hook: None,
        })
    }

    #[cfg(test)]
    fn with_step_hook(mut self, hook: impl Fn(&mut TrainModel) + Send + Sync + 'static) -> Self {
        self.step_hook = Some(StepHook(Arc::new(hook)));
        self
    }

    /// Returns the model topology.
    #[must_use]
    pub const fn config(&self) -> &DroneNetConfig {
        &self.config
    }

    /// Returns the model store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    /// Returns a copy of the metrics recorded so far.
    #[must_use]
    pub fn metrics(&self) -> Vec<ModelMetrics> {
        self.history.snapshot()
    }

    /// Returns a shared handle to the metrics history.
    #[must_use]
    pub fn history(&self) -> MetricsHistory {
        self.history.clone()
    }

    /// Returns `true` while a run is in progress.
    #[must_use]
    pub fn is_training(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Trains to completion; see [`Trainer::spawn_training`].
    ///
    /// # Errors
    ///
    /// As [`Trainer::spawn_training`] and [`TrainingHandle::finish`].
    pub async fn train(
        &self,
        train: Dataset,
        validation: Dataset,
        config: &TrainingConfig,
    ) -> Result<TrainingReport> {
        self.spawn_training(train, validation, config)?.finish().await
    }

    /// Starts a training run on a blocking background task.
    ///
    /// Each epoch runs the training set in order in mini-batches of
    /// `config.batch_size`, taking one Adam step per batch on softmax
    /// cross-entropy, then evaluates `validation` if it is non-empty. The
    /// metrics history is reset at the start of each run.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] for a bad config,
    /// [`TrainingError::Dataset`] for an empty training set,
    /// [`TrainingError::Model`] if the data does not fit the model,
    /// [`TrainingError::AlreadyRunning`] if a run is active, and
    /// [`TrainingError::Worker`] outside a Tokio runtime.
    pub fn spawn_training(
        &self,
        train: Dataset,
        validation: Dataset,
        config: &TrainingConfig,
    ) -> Result<TrainingHandle> {
        config.validate()?;
        if train.is_empty() {
            return Err(DatasetError::EmptyDataset.into());
        }
        self.check_dataset(&train)?;
        if !validation.is_empty() {
            self.check_dataset(&validation)?;
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TrainingError::worker(e.to_string()))?;

        if self.running.swap(true, Ordering::AcqRel) {
            return Err(TrainingError::AlreadyRunning);
        }
        let running = RunningGuard(Arc::clone(&self.running));
        self.history.clear();

        let (tx, rx) = mpsc::channel(METRICS_CHANNEL_CAPACITY);
        let cancel = CancelToken::new();
        let job = FitJob {
            model: Arc::clone(&self.model),
            history: self.history.clone(),
            config: config.clone(),
            device: self.device,
            train,
            validation,
            cancel: cancel.clone(),
            tx,
            _running: running,
            #[cfg(test)]
            step_hook: self.step_hook.clone(),
        };
        info!(
            epochs = config.epochs,
            batch_size = config.batch_size,
            learning_rate = config.learning_rate,
            "starting training"
        );
        let join = runtime.spawn_blocking(move || job.run());

        Ok(TrainingHandle {
            metrics: rx,
            cancel,
            join,
        })
    }

    /// Returns softmax class probabilities for `batch`, one row per image.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Model`] if the batch does not match the
    /// model input.
    pub fn predict(&self, batch: &Batch) -> Result<Matrix> {
        let model = self.model.lock().valid();
        Ok(model.predict(&self.config, batch, &self.device)?)
    }

    /// Writes topology and weights to the store under `name`, replacing any
    /// previous model there.
    ///
    /// The weights are snapshotted under the model lock; encoding and store
    /// I/O run on a blocking task.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Model`] wrapping [`ModelError::Persistence`]
    /// or [`ModelError::InvalidKey`], and [`TrainingError::Worker`] if the
    /// blocking task panicked.
    pub async fn save_model(&self, name: &str) -> Result<()> {
        let model = self.model.lock().valid();
        let store = Arc::clone(&self.store);
        let config = self.config;
        let key = name.to_owned();
        tokio::task::spawn_blocking(move || {
            save_to_store::<InferenceBackend>(store.as_ref(), &key, &model, &config)
        })
        .await
        .map_err(|e| TrainingError::worker(e.to_string()))??;
        info!(name, "saved model");
        Ok(())
    }

    /// Replaces the held model with the one stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Model`] wrapping [`ModelError::NotFound`] if
    /// nothing is stored, or [`ModelError::Deserialization`] if the blob is
    /// corrupt or its topology differs from this trainer's, and
    /// [`TrainingError::AlreadyRunning`] during a run.
    pub async fn load_model(&self, name: &str) -> Result<()> {
        if self.is_training() {
            return Err(TrainingError::AlreadyRunning);
        }
        let store = Arc::clone(&self.store);
        let key = name.to_owned();
        let device = self.device;
        let (config, model) = tokio::task::spawn_blocking(move || {
            load_from_store::<TrainingBackend>(store.as_ref(), &key, &device)
        })
        .await
        .map_err(|e| TrainingError::worker(e.to_string()))??;
        if config != self.config {
            return Err(ModelError::deserialization(
                name,
                format!(
                    "stored topology {config:?} differs from trainer topology {:?}",
                    self.config
                ),
            )
            .into());
        }
        // A run may have started while the blob was decoding.
        if self.is_training() {
            return Err(TrainingError::AlreadyRunning);
        }
        *self.model.lock() = model;
        info!(name, "loaded model");
        Ok(())
    }

    fn check_dataset(&self, dataset: &Dataset) -> Result<()> {
        self.config.check_batch(dataset.xs())?;
        if dataset.label_width() != self.config.num_classes {
            return Err(ModelError::shape_mismatch(
                format!("{} label columns", self.config.num_classes),
                format!("{} label columns", dataset.label_width()),
            )
            .into());
        }
        Ok(())
    }
}

/// Clears the trainer's running flag when the job ends, including on panic.
#[derive(Debug)]
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a background run needs.
struct FitJob {
    model: Arc<Mutex<TrainModel>>,
    history: MetricsHistory,
    config: TrainingConfig,
    device: Device,
    train: Dataset,
    validation: Dataset,
    cancel: CancelToken,
    tx: mpsc::Sender<ModelMetrics>,
    _running: RunningGuard,
    #[cfg(test)]
    step_hook: Option<StepHook>,
}

impl FitJob {
    fn run(self) -> Result<TrainingReport> {
        let adam = &self.config.optimizer;
        let mut optim = AdamConfig::new()
            .with_beta_1(adam.beta1)
            .with_beta_2(adam.beta2)
            .with_epsilon(adam.epsilon)
            .init::<TrainingBackend, TrainModel>();

        let train_batches = self.train.batches(self.config.batch_size)?;
        let val_batches = self.validation.batches(self.config.batch_size)?;
        let mut state = TrainingState::from_config(&self.config);

        for epoch in 0..self.config.epochs {
            let (loss, accuracy) = self.train_epoch(epoch, &mut optim, &train_batches)?;
            let (val_loss, val_accuracy) = if val_batches.is_empty() {
                (None, None)
            } else {
                let (l, a) = self.evaluate(&val_batches);
                (Some(l), Some(a))
            };

            let metrics = ModelMetrics::new(epoch, loss, accuracy, val_loss, val_accuracy);
            info!(epoch = epoch + 1, "{metrics}");
            self.history.push(metrics.clone());
            if self.tx.blocking_send(metrics).is_err() {
                debug!("metrics receiver dropped");
            }
            state.next_epoch();

            // Uncoerced: a non-finite validation loss counts as no improvement.
            if let Some(val_loss) = val_loss {
                state.record_val_loss(val_loss);
                if state.should_early_stop() {
                    info!(
                        epoch = epoch + 1,
                        patience = state.patience,
                        "validation loss stopped improving, stopping early"
                    );
                    state.early_stop();
                    break;
                }
            }
        }

        let reason = if state.early_stopped {
            StopReason::EarlyStopped
        } else {
            StopReason::Completed
        };
        Ok(TrainingReport::new(self.history.snapshot(), reason))
    }

    /// Runs one pass over the training batches; returns mean loss and accuracy.
    fn train_epoch(
        &self,
        epoch: usize,
        optim: &mut impl Optimizer<TrainModel, TrainingBackend>,
        batches: &[Dataset],
    ) -> Result<(f32, f32)> {
        let learning_rate = f64::from(self.config.learning_rate);
        let mut tally = Tally::default();

        for batch in batches {
            if self.cancel.is_cancelled() {
                info!(completed_epochs = epoch, "training cancelled");
                return Err(TrainingError::Cancelled {
                    completed_epochs: epoch,
                });
            }

            let x = batch_to_tensor::<TrainingBackend>(batch.xs(), &self.device);
            let y = matrix_to_tensor::<TrainingBackend>(batch.ys(), &self.device);

            let mut model = self.model.lock();
            let logits = model.forward(x);
            let loss = cross_entropy(logits.clone(), y.clone());
            let loss_value: f32 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                warn!(epoch = epoch + 1, loss = loss_value, "training loss is not finite");
                return Err(TrainingError::Diverged {
                    epoch,
                    loss: loss_value,
                });
            }
            let grads = GradientsParams::from_grads(loss.backward(), &*model);
            *model = optim.step(learning_rate, model.clone(), grads);
            #[cfg(test)]
            if let Some(hook) = &self.step_hook {
                (hook.0)(&mut *model);
            }
            drop(model);

            tally.add(loss_value, count_correct(logits, y), batch.len());
        }
        Ok(tally.means())
    }

    /// Evaluates a snapshot of the model; returns mean loss and accuracy.
    fn evaluate(&self, batches: &[Dataset]) -> (f32, f32) {
        let model = self.model.lock().valid();
        let mut tally = Tally::default();
        for batch in batches {
            let x = batch_to_tensor::<InferenceBackend>(batch.xs(), &self.device);
            let y = matrix_to_tensor::<InferenceBackend>(batch.ys(), &self.device);
            let logits = model.forward(x);
            let loss: f32 = cross_entropy(logits.clone(), y.clone()).into_scalar().elem();
            tally.add(loss, count_correct(logits, y), batch.len());
        }
        tally.means()
    }
}

/// Sample-weighted loss and accuracy accumulator.
#[derive(Debug, Default)]
struct Tally {
    loss_sum: f64,
    correct: usize,
    seen: usize,
}

impl Tally {
    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, batch_loss: f32, correct: usize, samples: usize) {
        self.loss_sum += f64::from(batch_loss) * samples as f64;
        self.correct += correct;
        self.seen += samples;
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn means(&self) -> (f32, f32) {
        if self.seen == 0 {
            return (f32::NAN, f32::NAN);
        }
        let n = self.seen as f64;
        ((self.loss_sum / n) as f32, (self.correct as f64 / n) as f32)
    }
}

/// Mean categorical cross-entropy between softmax(`logits`) and one-hot `targets`.
fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (targets * log_softmax(logits, 1)).sum_dim(1).mean().neg()
}

/// Rows whose arg-max prediction matches the arg-max target.
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> usize {
    let hits: i64 = logits
        .argmax(1)
        .equal(targets.argmax(1))
        .int()
        .sum()
        .into_scalar()
        .elem();
    usize::try_from(hits).unwrap_or(0)
}
