//! Frame conversion, augmentation and shuffling.

use aero_types::{Batch, Frame};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{DatasetError, Result};
use crate::image::{RGB_CHANNELS, adjust_brightness, flip_left_right, frame_to_rgb, rotate};
use crate::splits::{ValidationFraction, split_dataset};

/// Default shuffle buffer size.
pub const DEFAULT_SHUFFLE_BUFFER: usize = 100;

/// Augmentation parameters.
///
/// The default flips randomly and jitters brightness by up to `0.1`, with no
/// rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Mirror each image left to right with probability 0.5.
    pub flip: bool,
    /// Maximum absolute brightness delta; `0` disables the step.
    pub brightness_range: f32,
    /// Per-image rotation in radians; empty disables the step.
    pub angles: Vec<f32>,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            flip: true,
            brightness_range: 0.1,
            angles: Vec::new(),
        }
    }
}

impl AugmentConfig {
    /// A configuration that leaves images unchanged.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            flip: false,
            brightness_range: 0.0,
            angles: Vec::new(),
        }
    }

    /// Sets random flipping.
    #[must_use]
    pub const fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    /// Sets the brightness range.
    #[must_use]
    pub const fn with_brightness_range(mut self, range: f32) -> Self {
        self.brightness_range = range;
        self
    }

    /// Sets per-image rotation angles.
    #[must_use]
    pub fn with_angles(mut self, angles: Vec<f32>) -> Self {
        self.angles = angles;
        self
    }
}

/// Turns frames into training tensors and randomizes them.
///
/// All random decisions come from one `ChaCha8` generator, so a seeded
/// preprocessor is fully reproducible.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    rng: ChaCha8Rng,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Preprocessor {
    /// Creates a preprocessor, seeded for reproducibility or from entropy.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64),
        }
    }

    /// Converts RGBA frames to a normalized RGB batch of `height x width` images.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InputShape`] for a malformed frame or empty
    /// target size.
    pub fn frames_to_batch(frames: &[Frame], height: usize, width: usize) -> Result<Batch> {
        let images = frames
            .iter()
            .map(|frame| frame_to_rgb(frame, height, width))
            .collect::<Result<Vec<_>>>()?;
        Ok(Batch::stack(&images, height, width, RGB_CHANNELS)?)
    }

    /// Returns an augmented copy of `images`.
    ///
    /// Each image is independently flipped with probability 0.5 when `flip`
    /// is set, shifted by a uniform brightness delta in
    /// `[-brightness_range, brightness_range]` and clipped to `[0, 1]` when
    /// the range is positive, then rotated by `angles[i]` when `angles` is
    /// non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InputShape`] if `angles` is non-empty and its
    /// length differs from the batch size, an angle is not finite, or flip
    /// or rotation is requested for images that are not RGB.
    pub fn augment(
        &mut self,
        images: &Batch,
        flip: bool,
        brightness_range: f32,
        angles: &[f32],
    ) -> Result<Batch> {
        if !angles.is_empty() && angles.len() != images.batch_size() {
            return Err(DatasetError::input_shape(format!(
                "{} rotation angles for {} images",
                angles.len(),
                images.batch_size()
            )));
        }
        if let Some(bad) = angles.iter().find(|a| !a.is_finite()) {
            return Err(DatasetError::input_shape(format!("rotation angle {bad} is not finite")));
        }

        if (flip || !angles.is_empty()) && images.channels() != RGB_CHANNELS {
            return Err(DatasetError::input_shape(format!(
                "flip and rotation need RGB images, got {} channels",
                images.channels()
            )));
        }

        let (h, w) = (images.height(), images.width());
        let mut out = images.clone();
        for i in 0..out.batch_size() {
            let flip_this = flip && self.rng.gen_bool(0.5);
            let delta = (brightness_range > 0.0)
                .then(|| self.rng.gen_range(-brightness_range..=brightness_range));

            let Some(image) = out.image_mut(i) else {
                continue;
            };
            if flip_this {
                let flipped = flip_left_right(image, h, w)?;
                image.copy_from_slice(&flipped);
            }
            if let Some(delta) = delta {
                adjust_brightness(image, delta);
            }
            if let Some(&angle) = angles.get(i) {
                let rotated = rotate(image, h, w, angle)?;
                image.copy_from_slice(&rotated);
            }
        }
        debug!(images = out.batch_size(), flip, brightness_range, "augmented batch");
        Ok(out)
    }

    /// Applies an [`AugmentConfig`].
    ///
    /// # Errors
    ///
    /// See [`Preprocessor::augment`].
    pub fn augment_with(&mut self, images: &Batch, config: &AugmentConfig) -> Result<Batch> {
        self.augment(images, config.flip, config.brightness_range, &config.angles)
    }

    /// Applies the default augmentation: random flip and `0.1` brightness jitter.
    ///
    /// # Errors
    ///
    /// See [`Preprocessor::augment`].
    pub fn augment_default(&mut self, images: &Batch) -> Result<Batch> {
        self.augment_with(images, &AugmentConfig::default())
    }

    /// Returns the sample order produced by a bounded shuffle buffer over `len` items.
    ///
    /// The buffer is filled with the first `buffer_size` items; each step
    /// emits a random buffered item and refills its slot from the stream;
    /// the remaining buffer is drained in random order. A buffer of one (or
    /// zero) keeps the input order.
    pub fn shuffle_order(&mut self, len: usize, buffer_size: usize) -> Vec<usize> {
        let buffer_size = buffer_size.max(1);
        let mut stream = 0..len;
        let mut buffer: Vec<usize> = stream.by_ref().take(buffer_size).collect();
        let mut order = Vec::with_capacity(len);

        for next in stream {
            let slot = self.rng.gen_range(0..buffer.len());
            order.push(buffer[slot]);
            buffer[slot] = next;
        }
        while !buffer.is_empty() {
            let slot = self.rng.gen_range(0..buffer.len());
            order.push(buffer.remove(slot));
        }
        order
    }

    /// Shuffles a dataset through a bounded buffer, keeping image / label pairs together.
    ///
    /// # Errors
    ///
    /// Propagates selection errors.
    pub fn shuffle(&mut self, dataset: &Dataset, buffer_size: usize) -> Result<Dataset> {
        let order = self.shuffle_order(dataset.len(), buffer_size);
        dataset.select(&order)
    }

    /// Partitions a dataset; see [`split_dataset`].
    ///
    /// # Errors
    ///
    /// Propagates slicing errors.
    pub fn split_dataset(
        dataset: &Dataset,
        fraction: ValidationFraction,
    ) -> Result<(Dataset, Dataset)> {
        split_dataset(dataset, fraction)
    }

    /// Shuffles then splits into `(train, validation)`.
    ///
    /// # Errors
    ///
    /// Propagates shuffle and split errors.
    pub fn shuffle_and_split(
        &mut self,
        dataset: &Dataset,
        buffer_size: usize,
        fraction: ValidationFraction,
    ) -> Result<(Dataset, Dataset)> {
        let shuffled = self.shuffle(dataset, buffer_size)?;
        split_dataset(&shuffled, fraction)
    }
}
