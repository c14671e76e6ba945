//! Inline detector running on the caller's runtime.
//!
//! The model loads on a blocking task, started eagerly with
//! [`Detector::start_loading`] or lazily by the first [`Detector::detect`].
//! Until it is ready, `detect` returns no detections instead of waiting.
//! The load status is published on a watch channel so [`Detector::load`] can
//! wait for a load already in flight.

use std::fmt;
use std::sync::Arc;

use aero_types::{Detection, Frame};
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, warn};

use crate::error::{DetectionError, Result};
use crate::model::ModelLoader;
use crate::state::DetectorState;

/// Where the detector's model is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Loading has not been requested.
    Idle,
    /// A load is in progress.
    Loading,
    /// A model is ready.
    Ready,
    /// The last load failed.
    Failed(String),
}

/// Detects drones in frames using a lazily loaded model.
///
/// Cloning shares the same model.
#[derive(Clone)]
pub struct Detector {
    state: Arc<RwLock<DetectorState>>,
    status: Arc<watch::Sender<LoadStatus>>,
    loader: Arc<dyn ModelLoader>,
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl Detector {
    /// Creates a detector; nothing is loaded yet.
    #[must_use]
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        let (status, _) = watch::channel(LoadStatus::Idle);
        Self {
            state: Arc::new(RwLock::new(DetectorState::new())),
            status: Arc::new(status),
            loader: Arc::new(loader),
        }
    }

    /// Current load status.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.status.borrow().clone()
    }

    /// Returns `true` once a model is ready.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        *self.status.borrow() == LoadStatus::Ready
    }

    /// Starts loading in the background unless a load is running or done.
    ///
    /// A failed load may be retried by calling this again. Returns `false`
    /// when no load was started.
    pub fn start_loading(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, detection model not loaded");
            return false;
        };
        if !self.begin_load() {
            return false;
        }
        let this = self.clone();
        runtime.spawn(async move {
            if let Err(e) = this.finish_load().await {
                debug!(error = %e, "background model load failed");
            }
        });
        true
    }

    /// Loads the model and waits for it.
    ///
    /// If a load is already running, waits for that one instead of starting
    /// another. Returns at once when a model is ready.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ModelLoad`] if loading fails.
    pub async fn load(&self) -> Result<()> {
        loop {
            if self.begin_load() {
                return self.finish_load().await;
            }
            let mut status = self.status.subscribe();
            let settled = status
                .wait_for(|s| *s != LoadStatus::Loading)
                .await
                .map_err(|_| DetectionError::model_load("detector dropped"))?
                .clone();
            match settled {
                LoadStatus::Ready => return Ok(()),
                LoadStatus::Failed(reason) => return Err(DetectionError::ModelLoad(reason)),
                // Unloaded while we waited: start a fresh load.
                LoadStatus::Idle | LoadStatus::Loading => {}
            }
        }
    }

    /// Detects drones in `frame`.
    ///
    /// Never fails: returns nothing while the model is loading or missing,
    /// and logs inference errors. The first call starts a lazy load.
    pub async fn detect(&self, frame: &Frame) -> Vec<Detection> {
        let status = self.status();
        if status == LoadStatus::Idle {
            self.start_loading();
        }
        if status != LoadStatus::Ready {
            return Vec::new();
        }

        let state = Arc::clone(&self.state).read_owned().await;
        let frame = frame.clone();
        match tokio::task::spawn_blocking(move || state.detect(&frame)).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!(error = %e, "detection task failed");
                Vec::new()
            }
        }
    }

    /// Releases the model; the next `detect` loads it again.
    pub async fn unload(&self) {
        self.state.write().await.unload();
        self.status.send_replace(LoadStatus::Idle);
    }

    /// Moves `Idle` or `Failed` to `Loading`; `false` otherwise.
    fn begin_load(&self) -> bool {
        self.status.send_if_modified(|status| match status {
            LoadStatus::Idle | LoadStatus::Failed(_) => {
                *status = LoadStatus::Loading;
                true
            }
            LoadStatus::Loading | LoadStatus::Ready => false,
        })
    }

    async fn finish_load(&self) -> Result<()> {
        let loader = Arc::clone(&self.loader);
        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| DetectionError::model_load(e.to_string()))
            .and_then(|r| r);

        match loaded {
            Ok(model) => {
                self.state.write().await.set_model(model);
                self.status.send_replace(LoadStatus::Ready);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to load detection model");
                self.status.send_replace(LoadStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }
}
