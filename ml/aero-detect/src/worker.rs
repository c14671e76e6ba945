//! Detection offloaded to a dedicated worker.
//!
//! The worker runs on a blocking task and owns its [`DetectorState`]. Clients
//! send [`DetectRequest`]s tagged with a fresh id and park a oneshot sender
//! in a pending table; a dispatcher task routes each [`DetectResponse`] back
//! by id. A request that outlives its timeout is evicted and answered empty.
//!
//! The model loads on its own blocking task and reaches the worker as a
//! message, so requests that arrive first are answered at once with no
//! detections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use aero_types::{Detection, Frame};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::detector::LoadStatus;
use crate::error::{DetectionError, Result};
use crate::model::{DetectionModel, ModelLoader};
use crate::state::DetectorState;

/// A frame submitted to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectRequest {
    /// Client-assigned id, unique per worker.
    pub request_id: u64,
    /// Frame to analyze.
    pub frame: Frame,
}

/// The worker's answer to one [`DetectRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Id of the request being answered.
    pub request_id: u64,
    /// Detections for the frame.
    pub detections: Vec<Detection>,
}

/// Worker tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Requests buffered before `detect` waits for room.
    pub queue_capacity: usize,
    /// How long a client waits for its response.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    /// Sets the request queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

enum WorkerMessage {
    Detect(DetectRequest),
    Loaded(Result<Box<dyn DetectionModel>>),
    Shutdown,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Vec<Detection>>>>>;

/// Sends frames to a [`DetectionWorker`]. Cheap to clone.
#[derive(Clone)]
pub struct DetectionClient {
    requests: mpsc::Sender<WorkerMessage>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
    timeout: Duration,
}

impl std::fmt::Debug for DetectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionClient")
            .field("pending", &self.pending_requests())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DetectionClient {
    /// Detects drones in `frame` on the worker.
    ///
    /// Never fails: a closed worker or a timeout yields no detections.
    pub async fn detect(&self, frame: &Frame) -> Vec<Detection> {
        match self.try_detect(frame).await {
            Ok(detections) => detections,
            Err(e @ DetectionError::Timeout { .. }) => {
                warn!(frame = frame.id, error = %e, "detection request abandoned");
                Vec::new()
            }
            Err(e) => {
                debug!(frame = frame.id, error = %e, "detection unavailable");
                Vec::new()
            }
        }
    }

    /// Detects drones in `frame`, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::WorkerClosed`] if the worker is gone and
    /// [`DetectionError::Timeout`] if no response arrives in time.
    pub async fn try_detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            request_id,
        };

        let request = DetectRequest {
            request_id,
            frame: frame.clone(),
        };
        let exchange = async {
            self.requests
                .send(WorkerMessage::Detect(request))
                .await
                .map_err(|_| DetectionError::WorkerClosed)?;
            rx.await.map_err(|_| DetectionError::WorkerClosed)
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| DetectionError::Timeout { request_id })?
    }

    /// Requests awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` once the worker has stopped accepting requests.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

/// Removes a request's pending entry when its caller stops waiting.
struct PendingEntry<'a> {
    pending: &'a PendingMap,
    request_id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.request_id);
    }
}

/// Owns the detection worker and its response dispatcher.
///
/// Dropping it stops the worker; pending requests resolve empty.
#[derive(Debug)]
pub struct DetectionWorker {
    client: DetectionClient,
    closed: Arc<AtomicBool>,
    status: Arc<watch::Sender<LoadStatus>>,
    worker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    /// Starts a worker that serves requests in arrival order while a model
    /// loads through `loader` in the background.
    ///
    /// Requests served before the model is ready get no detections. If
    /// loading fails the worker keeps answering with no detections.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::WorkerClosed`] outside a Tokio runtime.
    pub fn spawn(loader: impl ModelLoader + 'static, config: WorkerConfig) -> Result<Self> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| DetectionError::WorkerClosed)?;
        let capacity = config.queue_capacity.max(1);
        let (request_tx, request_rx) = mpsc::channel(capacity);
        let (response_tx, response_rx) = mpsc::channel(capacity);
        let pending = PendingMap::default();
        let closed = Arc::new(AtomicBool::new(false));
        let (status, _) = watch::channel(LoadStatus::Loading);
        let status = Arc::new(status);

        {
            let loaded_tx = request_tx.clone();
            // Fails only if the worker stopped first; the model is dropped.
            runtime.spawn_blocking(move || {
                let _ = loaded_tx.blocking_send(WorkerMessage::Loaded(loader.load()));
            });
        }
        let worker = {
            let closed = Arc::clone(&closed);
            let status = Arc::clone(&status);
            runtime.spawn_blocking(move || serve(request_rx, &response_tx, &closed, &status))
        };
        let dispatcher = runtime.spawn(dispatch(response_rx, Arc::clone(&pending)));
        info!(capacity, timeout = ?config.request_timeout, "detection worker started");

        Ok(Self {
            client: DetectionClient {
                requests: request_tx,
                pending,
                next_id: Arc::new(AtomicU64::new(0)),
                timeout: config.request_timeout,
            },
            closed,
            status,
            worker: Some(worker),
            dispatcher: Some(dispatcher),
        })
    }

    /// Returns a client for this worker.
    #[must_use]
    pub fn client(&self) -> DetectionClient {
        self.client.clone()
    }

    /// Where the worker's model is in its lifecycle.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.status.borrow().clone()
    }

    /// Returns `true` once the worker holds a model.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        *self.status.borrow() == LoadStatus::Ready
    }

    /// Waits until the background load has finished.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ModelLoad`] if loading failed and
    /// [`DetectionError::WorkerClosed`] if the worker stopped first.
    pub async fn wait_loaded(&self) -> Result<()> {
        let mut status = self.status.subscribe();
        let settled = status
            .wait_for(|s| *s != LoadStatus::Loading)
            .await
            .map_err(|_| DetectionError::WorkerClosed)?
            .clone();
        match settled {
            LoadStatus::Ready => Ok(()),
            LoadStatus::Failed(reason) => Err(DetectionError::ModelLoad(reason)),
            LoadStatus::Idle | LoadStatus::Loading => Err(DetectionError::WorkerClosed),
        }
    }

    /// Detects drones in `frame`; see [`DetectionClient::detect`].
    pub async fn detect(&self, frame: &Frame) -> Vec<Detection> {
        self.client.detect(frame).await
    }

    /// Stops the worker, releases its model and waits for both tasks.
    pub async fn shutdown(mut self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.client.requests.send(WorkerMessage::Shutdown).await;
        for task in [self.worker.take(), self.dispatcher.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = task.await {
                warn!(error = %e, "detection task ended abnormally");
            }
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.client.requests.try_send(WorkerMessage::Shutdown);
    }
}

/// Worker loop; runs on a blocking thread.
fn serve(
    mut requests: mpsc::Receiver<WorkerMessage>,
    responses: &mpsc::Sender<DetectResponse>,
    closed: &AtomicBool,
    status: &watch::Sender<LoadStatus>,
) {
    let mut state = DetectorState::new();

    while let Some(message) = requests.blocking_recv() {
        if closed.load(Ordering::Acquire) {
            break;
        }
        match message {
            WorkerMessage::Detect(request) => {
                let response = DetectResponse {
                    request_id: request.request_id,
                    detections: state.detect(&request.frame),
                };
                if responses.blocking_send(response).is_err() {
                    break;
                }
            }
            WorkerMessage::Loaded(Ok(model)) => {
                info!(model = model.name(), "detection model loaded");
                state.set_model(model);
                status.send_replace(LoadStatus::Ready);
            }
            WorkerMessage::Loaded(Err(e)) => {
                error!(error = %e, "failed to load detection model");
                status.send_replace(LoadStatus::Failed(e.to_string()));
            }
            WorkerMessage::Shutdown => break,
        }
    }

    requests.close();
    state.unload();
    status.send_replace(LoadStatus::Idle);
    info!("detection worker stopped");
}

/// Routes responses to their waiting clients.
async fn dispatch(mut responses: mpsc::Receiver<DetectResponse>, pending: PendingMap) {
    while let Some(response) = responses.recv().await {
        let waiter = pending.lock().remove(&response.request_id);
        match waiter {
            Some(tx) => {
                if tx.send(response.detections).is_err() {
                    debug!(request_id = response.request_id, "requester went away");
                }
            }
            None => warn!(
                request_id = response.request_id,
                "dropping response for unknown request"
            ),
        }
    }
    // Worker is gone: wake everyone still waiting.
    pending.lock().clear();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn config_json_uses_millis() {
        let config = WorkerConfig::default().with_request_timeout(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"request_timeout\":250"));
        let back: WorkerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn spawn_needs_a_runtime() {
        let loader = || -> Result<Box<dyn crate::DetectionModel>> {
            Err(DetectionError::ModelNotLoaded)
        };
        assert!(matches!(
            DetectionWorker::spawn(loader, WorkerConfig::default()),
            Err(DetectionError::WorkerClosed)
        ));
    }

    #[tokio::test]
    async fn unloaded_worker_answers_empty() {
        let loader = || -> Result<Box<dyn crate::DetectionModel>> {
            Err(DetectionError::model_load("no model"))
        };
        let worker = DetectionWorker::spawn(loader, WorkerConfig::default()).unwrap();
        assert!(matches!(
            worker.wait_loaded().await,
            Err(DetectionError::ModelLoad(_))
        ));
        assert!(matches!(worker.status(), LoadStatus::Failed(_)));
        let frame = Frame::solid(9, 0.0, 2, 2, [0, 0, 0, 255]);
        assert!(worker.detect(&frame).await.is_empty());
        assert_eq!(worker.client().pending_requests(), 0);
        worker.shutdown().await;
    }
}
