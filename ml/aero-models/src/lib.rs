//! DroneNet model and model persistence for AEROPUNK.
//!
//! # Model
//!
//! - [`DroneNet`] - Conv / max-pool / dense image classifier built with Burn
//! - [`DroneNetConfig`] - Its topology (input size, filters, hidden units, classes)
//!
//! # Persistence
//!
//! - [`encode_model`] / [`decode_model`] - Self-describing model blobs
//! - [`ModelStore`] - Keyed blob storage, with [`MemoryStore`] and [`FileStore`]
//!
//! # Backends
//!
//! Inference uses [`InferenceBackend`] (`burn-ndarray` on the CPU); training
//! uses [`TrainingBackend`], the same backend under `burn-autodiff`.
//!
//! # Example
//!
//! ```
//! use aero_models::{
//!     DroneNetConfig, InferenceBackend, MemoryStore, default_device, load_from_store,
//!     save_to_store,
//! };
//!
//! let device = default_device();
//! let config = DroneNetConfig::new(2).with_input_size(8, 8);
//! let model = config.init::<InferenceBackend>(&device);
//!
//! let store = MemoryStore::new();
//! save_to_store(&store, "drone-detection-model", &model, &config).unwrap();
//! let (loaded, _model) =
//!     load_from_store::<InferenceBackend>(&store, "drone-detection-model", &device).unwrap();
//! assert_eq!(loaded, config);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod backend;
mod checkpoint;
mod drone_net;
mod error;
mod store;

pub use drone_net::{DroneNet, DroneNetConfig, batch_to_tensor, matrix_to_tensor, tensor_to_matrix};

pub use checkpoint::{
    BLOB_MAGIC, BLOB_VERSION, decode_header, decode_model, encode_model, load_from_store,
    save_to_store,
};
pub use store::{FileStore, MemoryStore, ModelStore, validate_key};

pub use backend::{Device, InferenceBackend, TrainingBackend, default_device};

pub use error::{ModelError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        DroneNet, DroneNetConfig, FileStore, InferenceBackend, MemoryStore, ModelError,
        ModelStore, TrainingBackend, default_device, load_from_store, save_to_store,
    };
}
