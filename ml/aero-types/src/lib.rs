//! Core types for the AEROPUNK perception pipeline.
//!
//! # Input Types
//!
//! - [`Frame`] - Raw RGBA camera frame handed over by the capture layer
//!
//! # Tensor Types
//!
//! - [`Batch`] - Owned 4-D image batch, `[batch, height, width, channels]`
//! - [`Matrix`] - Owned 2-D array for one-hot labels and class scores
//!
//! # Output Types
//!
//! - [`Detection`] - Labeled pixel-space box with a score in `[0, 1]`
//! - [`BoundingBox`] - Pixel-space rectangle
//!
//! # Logging
//!
//! - [`LogEvent`] / [`LogSink`] - Structured events for a host UI
//!
//! # Example
//!
//! ```
//! use aero_types::{Batch, Detection, BoundingBox, Frame};
//!
//! let frame = Frame::solid(1, 0.033, 64, 48, [0, 0, 0, 255]);
//! assert!(frame.validate().is_ok());
//!
//! let batch = Batch::zeros([1, 8, 8, 3]);
//! assert_eq!(batch.image_len(), 192);
//!
//! let det = Detection::new(BoundingBox::full_frame(64, 48), "drone", 1.7);
//! assert!((det.score - 1.0).abs() < f32::EPSILON);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bbox;
mod detection;
mod error;
mod frame;
mod log;
mod tensor;

pub use bbox::BoundingBox;
pub use detection::{Detection, clamp_score, filter_by_score};
pub use frame::Frame;
pub use log::{LogEvent, LogLevel, LogSink, MemorySink, TracingSink};
pub use tensor::{Batch, Matrix};

pub use error::{Result, TypesError};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Batch, BoundingBox, Detection, Frame, LogEvent, LogLevel, LogSink, Matrix, Result,
        TypesError,
    };
}
