//! Training data preparation for AEROPUNK.
//!
//! # Conversion
//!
//! - [`Preprocessor::frames_to_batch`] - RGBA frames to a normalized RGB [`Batch`](aero_types::Batch)
//!
//! # Randomization
//!
//! - [`Preprocessor::augment`] - Per-image flip, brightness jitter and rotation
//! - [`Preprocessor::shuffle`] - Bounded-buffer shuffle of a [`Dataset`]
//!
//! # Partitioning
//!
//! - [`split_dataset`] - Contiguous train / validation split
//! - [`ValidationFraction`] - Hold-out fraction in `(0, 1)`
//!
//! # Example
//!
//! ```
//! use aero_dataset::{Dataset, Preprocessor, ValidationFraction};
//! use aero_types::{Batch, Matrix};
//!
//! let xs = Batch::zeros([10, 4, 4, 3]);
//! let ys = Matrix::one_hot(&[0, 1, 0, 1, 0, 1, 0, 1, 0, 1], 2).unwrap();
//! let dataset = Dataset::new(xs, ys).unwrap();
//!
//! let mut pre = Preprocessor::new(Some(42));
//! let (train, val) = pre
//!     .shuffle_and_split(&dataset, 100, ValidationFraction::default())
//!     .unwrap();
//!
//! assert_eq!(train.len(), 8);
//! assert_eq!(val.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod dataset;
mod error;
pub mod image;
mod preprocessor;
mod splits;

pub use dataset::Dataset;
pub use preprocessor::{AugmentConfig, DEFAULT_SHUFFLE_BUFFER, Preprocessor};
pub use splits::{ValidationFraction, split_dataset};

pub use error::{DatasetError, Result};
