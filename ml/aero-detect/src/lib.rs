//! Drone detection on live frames.
//!
//! # Models
//!
//! - [`DetectionModel`] - Frame in, detections out
//! - [`ClassifierDetector`] - Whole-frame detector over a trained DroneNet
//! - [`ModelLoader`] / [`StoreLoader`] - Deferred model construction
//!
//! # Running detection
//!
//! - [`Detector`] - Inline; loads in the background and answers empty until ready
//! - [`DetectionWorker`] / [`DetectionClient`] - Offloaded to a dedicated
//!   worker, requests correlated by id
//!
//! Neither form ever returns an error from `detect`: failures are logged and
//! reported as no detections.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use aero_detect::{Detector, StoreLoader};
//! use aero_models::FileStore;
//!
//! let store = Arc::new(FileStore::open("models")?);
//! let detector = Detector::new(StoreLoader::new(store, "drone-detection-model"));
//! detector.start_loading();
//! let detections = detector.detect(&frame).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod detector;
mod error;
mod model;
mod state;
mod worker;

pub use detector::{Detector, LoadStatus};

pub use model::{ClassifierDetector, DEFAULT_MIN_SCORE, DetectionModel, ModelLoader, StoreLoader};

pub use state::DetectorState;

pub use worker::{DetectRequest, DetectResponse, DetectionClient, DetectionWorker, WorkerConfig};

pub use error::{DetectionError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        ClassifierDetector, DetectionClient, DetectionError, DetectionModel, DetectionWorker,
        Detector, DetectorState, LoadStatus, ModelLoader, StoreLoader, WorkerConfig,
    };
}
