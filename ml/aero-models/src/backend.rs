//! Backend selection.
//!
//! Inference runs on the CPU `NdArray` backend; training wraps it in
//! `Autodiff` so gradients are tracked.

use burn::prelude::Backend;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;

/// Backend used for prediction and detection.
pub type InferenceBackend = NdArray<f32>;

/// Backend used for training.
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Device shared by both backends.
pub type Device = <InferenceBackend as Backend>::Device;

/// Returns the default CPU device.
#[must_use]
pub fn default_device() -> Device {
    Device::default()
}
