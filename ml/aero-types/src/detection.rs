//! Detection result types.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// A single object detection in a frame.
///
/// Detections carry no identity across frames; they are produced per frame
/// and consumed immediately by an overlay renderer.
///
/// # Example
///
/// ```
/// use aero_types::{BoundingBox, Detection};
///
/// let det = Detection::new(BoundingBox::new(10.0, 10.0, 50.0, 80.0), "person", 0.92);
/// assert_eq!(det.class, "person");
/// assert!(det.score <= 1.0);
///
/// // Scores are clamped into [0, 1]
/// let det = Detection::new(BoundingBox::default(), "drone", 1.7);
/// assert!((det.score - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// Box around the detected object, in frame pixels.
    pub bbox: BoundingBox,

    /// Class label.
    pub class: String,

    /// Confidence score in `[0, 1]`.
    pub score: f32,
}

impl Detection {
    /// Creates a detection, clamping `score` into `[0, 1]`.
    ///
    /// A `NaN` score is recorded as `0`.
    #[must_use]
    pub fn new(bbox: BoundingBox, class: impl Into<String>, score: f32) -> Self {
        Self {
            bbox,
            class: class.into(),
            score: clamp_score(score),
        }
    }

    /// Returns `true` if the score reaches `threshold`.
    #[must_use]
    pub fn passes(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

/// Clamps a raw model score into `[0, 1]`, mapping `NaN` to `0`.
#[must_use]
pub fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Keeps detections whose score reaches `threshold`, highest score first.
#[must_use]
pub fn filter_by_score(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    let mut kept: Vec<Detection> = detections
        .into_iter()
        .filter(|d| d.passes(threshold))
        .collect();
    kept.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_clamps_score() {
        let high = Detection::new(BoundingBox::default(), "car", 3.0);
        assert!((high.score - 1.0).abs() < 1e-6);

        let low = Detection::new(BoundingBox::default(), "car", -0.5);
        assert!(low.score.abs() < 1e-6);

        let nan = Detection::new(BoundingBox::default(), "car", f32::NAN);
        assert!(nan.score.abs() < 1e-6);
    }

    #[test]
    fn detection_passes() {
        let det = Detection::new(BoundingBox::default(), "person", 0.5);
        assert!(det.passes(0.5));
        assert!(!det.passes(0.6));
    }

    #[test]
    fn filter_by_score_sorts_and_drops() {
        let dets = vec![
            Detection::new(BoundingBox::default(), "a", 0.3),
            Detection::new(BoundingBox::default(), "b", 0.9),
            Detection::new(BoundingBox::default(), "c", 0.6),
        ];
        let kept = filter_by_score(dets, 0.5);
        let classes: Vec<&str> = kept.iter().map(|d| d.class.as_str()).collect();
        assert_eq!(classes, vec!["b", "c"]);
    }

    #[test]
    fn detection_serialization_uses_class_key() {
        let det = Detection::new(BoundingBox::new(1.0, 2.0, 3.0, 4.0), "drone", 0.8);
        let json = serde_json::to_string(&det).unwrap_or_default();
        assert!(json.contains("\"class\":\"drone\""));

        let parsed: Result<Detection, _> = serde_json::from_str(&json);
        assert!(parsed.is_ok());
    }
}
