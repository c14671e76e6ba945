//! Detector state shared by the inline and offloaded detectors.

use std::fmt;

use aero_types::{Detection, Frame};
use tracing::{error, info, warn};

use crate::error::{DetectionError, Result};
use crate::model::{DetectionModel, ModelLoader};

/// Holds at most one loaded [`DetectionModel`].
#[derive(Default)]
pub struct DetectorState {
    model: Option<Box<dyn DetectionModel>>,
}

impl fmt::Debug for DetectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorState")
            .field("model", &self.model_name())
            .finish()
    }
}

impl DetectorState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state holding `model`.
    #[must_use]
    pub fn with_model(model: Box<dyn DetectionModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Loads a model through `loader`, replacing any current one.
    ///
    /// On failure the current model is kept.
    ///
    /// # Errors
    ///
    /// Returns the loader's error.
    pub fn load(&mut self, loader: &dyn ModelLoader) -> Result<()> {
        match loader.load() {
            Ok(model) => {
                info!(model = model.name(), "detection model loaded");
                self.model = Some(model);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to load detection model");
                Err(e)
            }
        }
    }

    /// Installs an already loaded model.
    pub fn set_model(&mut self, model: Box<dyn DetectionModel>) {
        self.model = Some(model);
    }

    /// Drops the current model.
    pub fn unload(&mut self) {
        self.model = None;
    }

    /// Returns `true` if a model is loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Name of the loaded model.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(DetectionModel::name)
    }

    /// Runs detection, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ModelNotLoaded`] without a model, otherwise
    /// the model's error.
    pub fn try_detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        self.model
            .as_deref()
            .ok_or(DetectionError::ModelNotLoaded)?
            .detect(frame)
    }

    /// Runs detection; empty when no model is loaded or the model fails.
    #[must_use]
    pub fn detect(&self, frame: &Frame) -> Vec<Detection> {
        match self.try_detect(frame) {
            Ok(detections) => detections,
            Err(DetectionError::ModelNotLoaded) => Vec::new(),
            Err(e) => {
                warn!(frame = frame.id, error = %e, "detection failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use aero_types::BoundingBox;

    use super::*;

    struct Fixed(Result<Vec<Detection>>);

    impl DetectionModel for Fixed {
        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>> {
            match &self.0 {
                Ok(d) => Ok(d.clone()),
                Err(e) => Err(DetectionError::inference(e.to_string())),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn frame() -> Frame {
        Frame::solid(3, 0.0, 4, 4, [0, 0, 0, 255])
    }

    #[test]
    fn unloaded_detects_nothing() {
        let state = DetectorState::new();
        assert!(!state.is_loaded());
        assert!(state.detect(&frame()).is_empty());
        assert!(matches!(
            state.try_detect(&frame()),
            Err(DetectionError::ModelNotLoaded)
        ));
    }

    #[test]
    fn model_errors_degrade_to_empty() {
        let state = DetectorState::with_model(Box::new(Fixed(Err(DetectionError::inference(
            "bad frame",
        )))));
        assert!(state.detect(&frame()).is_empty());
        assert!(state.try_detect(&frame()).is_err());
    }

    #[test]
    fn load_and_unload() {
        let hit = Detection::new(BoundingBox::full_frame(4, 4), "drone", 0.9);
        let expected = vec![hit.clone()];
        let loader = move || -> Result<Box<dyn DetectionModel>> {
            Ok(Box::new(Fixed(Ok(vec![hit.clone()]))))
        };

        let mut state = DetectorState::new();
        state.load(&loader).unwrap();
        assert_eq!(state.model_name(), Some("fixed"));
        assert_eq!(state.detect(&frame()), expected);

        state.unload();
        assert!(state.detect(&frame()).is_empty());
    }

    #[test]
    fn failed_load_keeps_current_model() {
        let failing =
            || -> Result<Box<dyn DetectionModel>> { Err(DetectionError::model_load("gone")) };
        let mut state = DetectorState::with_model(Box::new(Fixed(Ok(Vec::new()))));
        assert!(state.load(&failing).is_err());
        assert!(state.is_loaded());
    }
}
