//! Training for the AEROPUNK drone classifier.
//!
//! # Training Components
//!
//! - [`TrainingConfig`] - Epochs, batch size, Adam settings, early stopping
//! - [`Trainer`] - Owns a model; trains, predicts, saves and loads it
//! - [`TrainingHandle`] - Streams per-epoch [`ModelMetrics`] from a running fit
//! - [`MetricsHistory`] - Shared, append-only metrics record
//! - [`TrainingState`] - Epoch counter and early-stopping bookkeeping
//!
//! # Pipeline
//!
//! [`TrainingPipeline`] goes from labelled frames to a stored model in one
//! call, publishing progress and [`aero_types::LogEvent`]s on the way.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use aero_models::{DroneNetConfig, MemoryStore};
//! use aero_training::{Trainer, TrainingConfig};
//!
//! let trainer = Trainer::new(DroneNetConfig::new(2), Arc::new(MemoryStore::new()))?;
//! let report = trainer.train(train, validation, &TrainingConfig::default()).await?;
//! println!("{}", report.summary());
//! trainer.save_model("drone-detection-model").await?;
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod error;
mod metrics;
mod pipeline;
mod state;
mod trainer;

pub use config::{DEFAULT_MODEL_SLOT, OptimizerConfig, TrainingConfig};

pub use metrics::{MetricsHistory, ModelMetrics, StopReason, TrainingReport};

pub use state::TrainingState;

pub use trainer::{CancelToken, Trainer, TrainingHandle};

pub use pipeline::TrainingPipeline;

pub use error::{Result, TrainingError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        CancelToken, MetricsHistory, ModelMetrics, OptimizerConfig, StopReason, Trainer,
        TrainingConfig, TrainingError, TrainingHandle, TrainingPipeline, TrainingReport,
        TrainingState,
    };
}
