//! Bounding box type for object detection.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in frame pixel coordinates.
///
/// Format is `(x, y, width, height)` with `(x, y)` the top-left corner.
///
/// # Example
///
/// ```
/// use aero_types::BoundingBox;
///
/// let bbox = BoundingBox::new(10.0, 20.0, 40.0, 30.0);
///
/// assert!((bbox.right() - 50.0).abs() < 1e-6);
/// assert!((bbox.bottom() - 50.0).abs() < 1e-6);
/// assert!((bbox.area() - 1200.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Box width in pixels.
    pub width: f32,
    /// Box height in pixels.
    pub height: f32,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a bounding box from corner coordinates `(x0, y0, x1, y1)`.
    #[must_use]
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Creates a box covering a whole `width x height` frame.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Returns the box as an array `[x, y, width, height]`.
    #[must_use]
    pub const fn as_array(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Returns the right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Returns the bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Returns the box area.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Checks that the box has finite, non-negative extents.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite()) && self.width >= 0.0 && self.height >= 0.0
    }

    /// Computes the intersection-over-union (`IoU`) with another box.
    ///
    /// Returns a value in `[0, 1]` where 1 means perfect overlap.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let inter_w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let inter_h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let inter_area = inter_w * inter_h;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Clips the box to a `width x height` frame.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let x0 = self.x.clamp(0.0, w);
        let y0 = self.y.clamp(0.0, h);
        let x1 = self.right().clamp(0.0, w);
        let y1 = self.bottom().clamp(0.0, h);
        Self::from_corners(x0, y0, x1, y1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn bbox_dimensions() {
        let bbox = BoundingBox::new(1.0, 2.0, 4.0, 4.0);
        assert!((bbox.right() - 5.0).abs() < 1e-6);
        assert!((bbox.bottom() - 6.0).abs() < 1e-6);
        assert!((bbox.area() - 16.0).abs() < 1e-6);
    }

    #[test]
    fn bbox_from_corners_normalizes_order() {
        let bbox = BoundingBox::from_corners(10.0, 8.0, 2.0, 4.0);
        assert_eq!(bbox, BoundingBox::new(2.0, 4.0, 8.0, 4.0));
    }

    #[test]
    fn bbox_validity() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BoundingBox::new(0.0, 0.0, -1.0, 1.0).is_valid());
        assert!(!BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn bbox_iou() {
        let a = BoundingBox::new(0.0, 0.0, 50.0, 50.0);
        let b = BoundingBox::new(25.0, 25.0, 50.0, 50.0);

        // Intersection 625, union 2500 + 2500 - 625
        let iou = a.iou(&b);
        assert!(iou > 0.14 && iou < 0.15);

        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let c = BoundingBox::new(60.0, 60.0, 20.0, 20.0);
        assert!(a.iou(&c).abs() < 1e-6);
    }

    #[test]
    fn bbox_clamped() {
        let bbox = BoundingBox::new(-10.0, -5.0, 120.0, 50.0);
        let clamped = bbox.clamped(100, 40);
        assert_eq!(clamped, BoundingBox::new(0.0, 0.0, 100.0, 40.0));
    }

    #[test]
    fn bbox_full_frame() {
        let bbox = BoundingBox::full_frame(640, 480);
        assert_eq!(bbox.as_array(), [0.0, 0.0, 640.0, 480.0]);
    }

    #[test]
    fn bbox_serialization() {
        let bbox = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&bbox).unwrap();
        let parsed: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bbox);
    }
}
