//! Full training runs on tiny models.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use aero_dataset::Dataset;
use aero_models::{
    DroneNetConfig, InferenceBackend, MemoryStore, ModelError, ModelStore, default_device,
    load_from_store,
};
use aero_training::{
    DEFAULT_MODEL_SLOT, StopReason, Trainer, TrainingConfig, TrainingError, TrainingPipeline,
};
use aero_types::{Batch, Frame, LogLevel, Matrix, MemorySink};
use approx::assert_relative_eq;

fn model_config() -> DroneNetConfig {
    DroneNetConfig::new(2).with_input_size(6, 6).with_filters(2).with_hidden(4)
}

/// Class 0 images are dark, class 1 images are bright.
#[allow(clippy::cast_precision_loss)]
fn dataset(n: usize) -> Dataset {
    let config = model_config();
    let per_image = 6 * 6 * 3;
    let classes: Vec<usize> = (0..n).map(|i| i % 2).collect();
    let data = classes
        .iter()
        .enumerate()
        .flat_map(|(i, &c)| {
            (0..per_image).map(move |p| {
                let base = if c == 0 { 0.1 } else { 0.8 };
                base + ((i + p) % 5) as f32 * 0.02
            })
        })
        .collect();
    let xs = Batch::new(config.input_shape(n), data).unwrap();
    Dataset::new(xs, Matrix::one_hot(&classes, 2).unwrap()).unwrap()
}

fn trainer(store: Arc<dyn ModelStore>) -> Trainer {
    Trainer::new(model_config(), store).unwrap()
}

fn assert_probabilities(probs: &Matrix) {
    for r in 0..probs.rows() {
        let row = probs.row(r).unwrap();
        assert!(row.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p)));
        assert_relative_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("aero_training=debug")
        .try_init();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn metrics_follow_epoch_order_with_validation() {
    init_tracing();
    let trainer = trainer(Arc::new(MemoryStore::new()));
    let config = TrainingConfig::new(3, 4, 0.01);
    let report = trainer.train(dataset(8), dataset(4), &config).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    let metrics = trainer.metrics();
    assert_eq!(metrics.len(), 3);
    for (i, m) in metrics.iter().enumerate() {
        assert_eq!(m.epoch, i);
        assert!(m.val_loss.is_some_and(f32::is_finite));
        assert!(m.val_accuracy.is_some());
    }
    assert_eq!(report.metrics, metrics);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stagnating_validation_loss_stops_early() {
    let trainer = trainer(Arc::new(MemoryStore::new()));
    let config = TrainingConfig::new(50, 4, 1e-9)
        .with_patience(5)
        .with_min_delta(1e-3);
    let report = trainer.train(dataset(8), dataset(4), &config).await.unwrap();

    assert!(report.early_stopped());
    assert!(report.epochs_completed() < 20);
    assert_eq!(trainer.metrics().len(), report.epochs_completed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_early_stop_without_validation() {
    let trainer = trainer(Arc::new(MemoryStore::new()));
    let config = TrainingConfig::new(8, 4, 1e-9).with_patience(1).with_min_delta(1.0);
    let report = trainer.train(dataset(4), dataset(0), &config).await.unwrap();

    assert!(!report.early_stopped());
    assert_eq!(report.epochs_completed(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_then_load_reproduces_predictions() {
    let store: Arc<dyn ModelStore> = Arc::new(MemoryStore::new());
    let first = trainer(Arc::clone(&store));
    first
        .train(dataset(6), dataset(0), &TrainingConfig::new(2, 2, 0.01))
        .await
        .unwrap();
    first.save_model("checkpoint").await.unwrap();

    let fixed = dataset(4);
    let expected = first.predict(fixed.xs()).unwrap();

    let second = trainer(Arc::clone(&store));
    second.load_model("checkpoint").await.unwrap();
    let actual = second.predict(fixed.xs()).unwrap();

    for (a, e) in actual.data().iter().zip(expected.data()) {
        assert_relative_eq!(a, e, epsilon = 1e-6);
    }
}

#[tokio::test]
async fn load_missing_model_is_not_found() {
    let trainer = trainer(Arc::new(MemoryStore::new()));
    let err = trainer.load_model("missing").await.unwrap_err();
    assert!(matches!(err, TrainingError::Model(ModelError::NotFound(_))));
}

#[tokio::test]
async fn load_with_other_topology_is_rejected() {
    let store: Arc<dyn ModelStore> = Arc::new(MemoryStore::new());
    let wide = Trainer::new(model_config().with_hidden(8), Arc::clone(&store)).unwrap();
    wide.save_model("wide").await.unwrap();

    let err = trainer(store).load_model("wide").await.unwrap_err();
    assert!(matches!(
        err,
        TrainingError::Model(ModelError::Deserialization { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn predictions_during_training_are_whole() {
    let trainer = Arc::new(trainer(Arc::new(MemoryStore::new())));
    let fixed = dataset(3);
    let handle = trainer
        .spawn_training(dataset(16), dataset(4), &TrainingConfig::new(15, 2, 0.05))
        .unwrap();

    let mut observed = 0;
    while !handle.is_finished() {
        assert_probabilities(&trainer.predict(fixed.xs()).unwrap());
        observed += 1;
        tokio::task::yield_now().await;
    }
    handle.finish().await.unwrap();

    assert!(observed > 0);
    assert_probabilities(&trainer.predict(fixed.xs()).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_stops_between_batches() {
    let trainer = trainer(Arc::new(MemoryStore::new()));
    let mut handle = trainer
        .spawn_training(dataset(8), dataset(0), &TrainingConfig::new(1000, 1, 0.01))
        .unwrap();

    let first = handle.next_epoch().await.unwrap();
    assert_eq!(first.epoch, 0);
    handle.cancel();

    let err = handle.finish().await.unwrap_err();
    let TrainingError::Cancelled { completed_epochs } = err else {
        panic!("expected cancellation, got {err}");
    };
    assert!(completed_epochs >= 1);
    assert!(completed_epochs < 1000);
    assert_eq!(trainer.metrics().len(), completed_epochs);
    assert!(!trainer.is_training());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_run_at_a_time() {
    let store: Arc<dyn ModelStore> = Arc::new(MemoryStore::new());
    let trainer = trainer(Arc::clone(&store));
    trainer.save_model("initial").await.unwrap();

    let handle = trainer
        .spawn_training(dataset(8), dataset(0), &TrainingConfig::new(1000, 1, 0.01))
        .unwrap();
    assert!(trainer.is_training());
    assert!(matches!(
        trainer.spawn_training(dataset(2), dataset(0), &TrainingConfig::new(1, 1, 0.01)),
        Err(TrainingError::AlreadyRunning)
    ));
    assert!(matches!(
        trainer.load_model("initial").await,
        Err(TrainingError::AlreadyRunning)
    ));

    handle.cancel();
    assert!(handle.finish().await.unwrap_err().is_cancelled());
    assert!(!trainer.is_training());
    trainer.load_model("initial").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pipeline_trains_and_saves_default_slot() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let pipeline = TrainingPipeline::new(store.clone(), sink.clone()).with_input_size(6, 6);

    let frames: Vec<Frame> = (0..6u64)
        .map(|i| {
            let color = if i % 2 == 0 { [20, 20, 20, 255] } else { [230, 230, 230, 255] };
            Frame::solid(i, 0.0, 12, 8, color)
        })
        .collect();
    let labels: Vec<Vec<f32>> = (0..6)
        .map(|i| if i % 2 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
        .collect();
    let config = TrainingConfig::new(2, 2, 0.01)
        .with_seed(7)
        .with_validation_fraction(0.5);

    let report = pipeline.run(&frames, &labels, &config).await.unwrap();

    assert_eq!(report.epochs_completed(), 2);
    assert_eq!(pipeline.progress(), 100);
    assert!(!pipeline.is_training());
    assert!(pipeline.last_error().is_none());
    assert_eq!(pipeline.metrics().len(), 2);
    assert!(sink.contains_level(LogLevel::Info));
    assert!(sink.contains_level(LogLevel::Success));
    assert!(!sink.contains_level(LogLevel::Error));

    assert!(store.exists(DEFAULT_MODEL_SLOT).unwrap());
    let (saved, _model) =
        load_from_store::<InferenceBackend>(store.as_ref(), DEFAULT_MODEL_SLOT, &default_device())
            .unwrap();
    assert_eq!(saved.num_classes, 2);
    assert_eq!((saved.input_height, saved.input_width), (6, 6));
}
