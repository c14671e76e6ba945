//! Request correlation, timeouts and shutdown of the detection worker.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use aero_detect::{
    DetectionModel, DetectionWorker, Detector, LoadStatus, Result, StoreLoader, WorkerConfig,
};
use aero_models::{DroneNetConfig, InferenceBackend, MemoryStore, default_device, save_to_store};
use aero_types::{BoundingBox, Detection, Frame};

/// Reports the frame id as the class, after an optional delay.
struct EchoModel {
    delay: Duration,
}

impl DetectionModel for EchoModel {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        std::thread::sleep(self.delay);
        Ok(vec![Detection::new(
            BoundingBox::full_frame(frame.width(), frame.height()),
            format!("frame-{}", frame.id),
            0.9,
        )])
    }

    fn name(&self) -> &str {
        "echo"
    }
}

fn echo(delay: Duration) -> impl Fn() -> Result<Box<dyn DetectionModel>> + Send + Sync {
    move || Ok(Box::new(EchoModel { delay }) as Box<dyn DetectionModel>)
}

fn frame(id: u64) -> Frame {
    Frame::solid(id, 0.0, 4, 4, [10, 10, 10, 255])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_requests_get_their_own_answers() {
    let worker = DetectionWorker::spawn(echo(Duration::from_millis(2)), WorkerConfig::default())
        .unwrap();
    worker.wait_loaded().await.unwrap();

    let tasks: Vec<_> = (0..12u64)
        .map(|id| {
            let client = worker.client();
            tokio::spawn(async move { (id, client.detect(&frame(id)).await) })
        })
        .collect();

    for task in tasks {
        let (id, detections) = task.await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class, format!("frame-{id}"));
    }
    assert_eq!(worker.client().pending_requests(), 0);
    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_request_is_evicted() {
    let config = WorkerConfig::default().with_request_timeout(Duration::from_millis(30));
    let worker = DetectionWorker::spawn(echo(Duration::from_millis(300)), config).unwrap();
    worker.wait_loaded().await.unwrap();
    let client = worker.client();

    assert!(client.detect(&frame(1)).await.is_empty());
    assert_eq!(client.pending_requests(), 0);
    assert!(matches!(
        client.try_detect(&frame(2)).await,
        Err(aero_detect::DetectionError::Timeout { .. })
    ));
    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_clients() {
    let worker =
        DetectionWorker::spawn(echo(Duration::ZERO), WorkerConfig::default()).unwrap();
    worker.wait_loaded().await.unwrap();
    let client = worker.client();
    assert_eq!(client.detect(&frame(5)).await.len(), 1);

    worker.shutdown().await;
    assert!(client.is_closed());
    assert!(client.detect(&frame(6)).await.is_empty());
    assert!(matches!(
        client.try_detect(&frame(7)).await,
        Err(aero_detect::DetectionError::WorkerClosed)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_worker_resolves_pending_requests() {
    let config = WorkerConfig::default().with_request_timeout(Duration::from_secs(10));
    let worker = DetectionWorker::spawn(echo(Duration::from_millis(100)), config).unwrap();
    let client = worker.client();

    let waiting = {
        let client = client.clone();
        tokio::spawn(async move { client.detect(&frame(1)).await })
    };
    let queued = {
        let client = client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.detect(&frame(2)).await
        })
    };
    tokio::time::sleep(Duration::from_millis(40)).await;
    drop(worker);

    let first = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), queued)
        .await
        .unwrap()
        .unwrap();
    assert!(first.len() <= 1);
    assert!(second.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn requests_during_a_slow_load_are_answered_empty() {
    let slow = || -> Result<Box<dyn DetectionModel>> {
        std::thread::sleep(Duration::from_millis(600));
        Ok(Box::new(EchoModel { delay: Duration::ZERO }))
    };
    let worker = DetectionWorker::spawn(slow, WorkerConfig::default()).unwrap();

    let started = Instant::now();
    assert!(worker.detect(&frame(1)).await.is_empty());
    assert!(worker.detect(&frame(2)).await.is_empty());
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(worker.status(), LoadStatus::Loading);

    worker.wait_loaded().await.unwrap();
    assert!(worker.is_loaded());
    let detections = worker.detect(&frame(3)).await;
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class, "frame-3");
    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inline_detector_before_and_after_load() {
    let store = Arc::new(MemoryStore::new());
    let config = DroneNetConfig::new(2).with_input_size(6, 6).with_filters(2).with_hidden(4);
    let model = config.init::<InferenceBackend>(&default_device());
    save_to_store(store.as_ref(), "drone-detection-model", &model, &config).unwrap();

    let loader = StoreLoader::new(store, "drone-detection-model")
        .with_labels(vec!["background".into(), "drone".into()])
        .with_min_score(0.0);
    let detector = Detector::new(loader);

    assert!(detector.detect(&frame(1)).await.is_empty());
    detector.load().await.unwrap();
    let detections = detector.detect(&frame(2)).await;
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].bbox, BoundingBox::full_frame(4, 4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_serves_stored_model() {
    let store = Arc::new(MemoryStore::new());
    let config = DroneNetConfig::new(2).with_input_size(6, 6).with_filters(2).with_hidden(4);
    let model = config.init::<InferenceBackend>(&default_device());
    save_to_store(store.as_ref(), "drone-detection-model", &model, &config).unwrap();

    let loader = StoreLoader::new(store, "drone-detection-model").with_min_score(0.0);
    let worker = DetectionWorker::spawn(loader, WorkerConfig::default()).unwrap();
    worker.wait_loaded().await.unwrap();
    let detections = worker.detect(&frame(3)).await;
    assert_eq!(detections.len(), 1);
    assert!(detections[0].class.starts_with("class_"));
    worker.shutdown().await;
}
