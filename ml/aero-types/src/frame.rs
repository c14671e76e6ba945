//! Video frame type delivered by a frame source.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// A captured video frame.
///
/// Frames are produced by an external source (webcam, simulated drone
/// camera) and borrowed by the pipeline for the duration of a single
/// preprocessing or detection call.
///
/// # Example
///
/// ```
/// use aero_types::Frame;
///
/// let frame = Frame::new(42, 1.5, vec![0u8; 640 * 480 * 4], 640, 480);
///
/// assert_eq!(frame.id, 42);
/// assert_eq!(frame.pixel_count(), 640 * 480);
/// assert!(frame.has_valid_buffer_size());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    /// Frame identifier, unique per source.
    pub id: u64,

    /// Capture timestamp in seconds, monotonically increasing per source.
    pub timestamp: f64,

    /// Raw RGBA8 pixel data, row-major.
    pub rgba: Vec<u8>,

    /// Image dimensions: `(width, height)`.
    pub size: (u32, u32),
}

impl Frame {
    /// Creates a new frame from RGBA8 pixel data.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(id: u64, timestamp: f64, rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            rgba,
            size: (width, height),
        }
    }

    /// Creates a frame filled with a single RGBA color.
    #[must_use]
    pub fn solid(id: u64, timestamp: f64, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let data = rgba.iter().copied().cycle().take(pixels * 4).collect();
        Self::new(id, timestamp, data, width, height)
    }

    /// Returns the image width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.size.0
    }

    /// Returns the image height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.size.1
    }

    /// Returns the total number of pixels.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        (self.size.0 as usize) * (self.size.1 as usize)
    }

    /// Returns the expected RGBA buffer size.
    #[must_use]
    pub const fn expected_buffer_size(&self) -> usize {
        self.pixel_count() * 4
    }

    /// Checks if the RGBA buffer has the expected size.
    #[must_use]
    pub fn has_valid_buffer_size(&self) -> bool {
        self.rgba.len() == self.expected_buffer_size()
    }

    /// Validates that the frame is non-empty and its buffer matches its size.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidDimensions`] for a zero-sized frame and
    /// [`TypesError::DataSizeMismatch`] when the buffer length is wrong.
    pub fn validate(&self) -> Result<()> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(TypesError::invalid_dimensions(self.size.0, self.size.1));
        }
        if !self.has_valid_buffer_size() {
            return Err(TypesError::data_size_mismatch(
                self.expected_buffer_size(),
                self.rgba.len(),
            ));
        }
        Ok(())
    }

    /// Returns the RGBA value at `(x, y)`, or `None` outside the frame.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.0 || y >= self.size.1 {
            return None;
        }
        let idx = ((y as usize) * (self.size.0 as usize) + x as usize) * 4;
        self.rgba
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            id: 0,
            timestamp: 0.0,
            rgba: Vec::new(),
            size: (0, 0),
        }
    }
}
