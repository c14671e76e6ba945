//! Detection models and how they are loaded.

use std::fmt;
use std::sync::Arc;

use aero_dataset::Preprocessor;
use aero_models::{
    Device, DroneNet, DroneNetConfig, InferenceBackend, ModelStore, default_device,
    load_from_store,
};
use aero_types::{BoundingBox, Detection, Frame};
use parking_lot::Mutex;

use crate::error::{DetectionError, Result};

/// Default minimum score for a reported detection.
pub const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Anything that turns a frame into detections.
pub trait DetectionModel: Send + Sync {
    /// Runs detection on one frame.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::Inference`] if the frame cannot be processed.
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Short human-readable model name.
    fn name(&self) -> &str;
}

/// Produces a [`DetectionModel`] on demand.
///
/// Loading may be slow; callers run it off the async executor.
pub trait ModelLoader: Send + Sync {
    /// Loads the model.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ModelLoad`] if the model is unavailable.
    fn load(&self) -> Result<Box<dyn DetectionModel>>;
}

impl<F> ModelLoader for F
where
    F: Fn() -> Result<Box<dyn DetectionModel>> + Send + Sync,
{
    fn load(&self) -> Result<Box<dyn DetectionModel>> {
        self()
    }
}

/// Whole-frame classifier backed by a trained [`DroneNet`].
///
/// The frame is resized to the model input; if the top class scores at
/// least `min_score`, one detection covering the frame is reported.
pub struct ClassifierDetector {
    name: String,
    config: DroneNetConfig,
    model: Mutex<DroneNet<InferenceBackend>>,
    labels: Vec<String>,
    min_score: f32,
    device: Device,
}

impl fmt::Debug for ClassifierDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierDetector")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("labels", &self.labels)
            .field("min_score", &self.min_score)
            .finish_non_exhaustive()
    }
}

impl ClassifierDetector {
    /// Wraps a model; classes are labelled `class_0`, `class_1`, ...
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: DroneNetConfig,
        model: DroneNet<InferenceBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            labels: (0..config.num_classes).map(|i| format!("class_{i}")).collect(),
            config,
            model: Mutex::new(model),
            min_score: DEFAULT_MIN_SCORE,
            device: default_device(),
        }
    }

    /// Loads the model stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ModelLoad`] if the key is missing or the
    /// blob cannot be decoded.
    pub fn from_store(store: &dyn ModelStore, key: &str) -> Result<Self> {
        let device = default_device();
        let (config, model) = load_from_store::<InferenceBackend>(store, key, &device)
            .map_err(|e| DetectionError::model_load(e.to_string()))?;
        Ok(Self::new(key, config, model))
    }

    /// Names the output classes, one label per class.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ModelLoad`] if the count differs from the
    /// model's class count.
    pub fn with_labels(mut self, labels: Vec<String>) -> Result<Self> {
        if labels.len() != self.config.num_classes {
            return Err(DetectionError::model_load(format!(
                "{} labels for a {}-class model",
                labels.len(),
                self.config.num_classes
            )));
        }
        self.labels = labels;
        Ok(self)
    }

    /// Sets the minimum reported score.
    #[must_use]
    pub const fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Returns the model topology.
    #[must_use]
    pub const fn config(&self) -> &DroneNetConfig {
        &self.config
    }

    /// Returns the class labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl DetectionModel for ClassifierDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let batch = Preprocessor::frames_to_batch(
            std::slice::from_ref(frame),
            self.config.input_height,
            self.config.input_width,
        )?;
        let probs = self
            .model
            .lock()
            .predict(&self.config, &batch, &self.device)
            .map_err(|e| DetectionError::inference(e.to_string()))?;

        let (Some(class), Some(row)) = (probs.argmax(0), probs.row(0)) else {
            return Ok(Vec::new());
        };
        let score = row[class];
        if score < self.min_score {
            return Ok(Vec::new());
        }
        Ok(vec![Detection::new(
            BoundingBox::full_frame(frame.width(), frame.height()),
            self.labels[class].clone(),
            score,
        )])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Loads a [`ClassifierDetector`] from a model store.
#[derive(Debug, Clone)]
pub struct StoreLoader {
    store: Arc<dyn ModelStore>,
    key: String,
    labels: Option<Vec<String>>,
    min_score: f32,
}

impl StoreLoader {
    /// Loads `key` from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ModelStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            labels: None,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// Class labels applied to the loaded model.
    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Minimum score applied to the loaded model.
    #[must_use]
    pub const fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

impl ModelLoader for StoreLoader {
    fn load(&self) -> Result<Box<dyn DetectionModel>> {
        let mut detector = ClassifierDetector::from_store(self.store.as_ref(), &self.key)?
            .with_min_score(self.min_score);
        if let Some(labels) = &self.labels {
            detector = detector.with_labels(labels.clone())?;
        }
        Ok(Box::new(detector))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use aero_models::{MemoryStore, save_to_store};

    use super::*;

    fn small() -> DroneNetConfig {
        DroneNetConfig::new(2).with_input_size(6, 6).with_filters(2).with_hidden(4)
    }

    fn detector() -> ClassifierDetector {
        let config = small();
        ClassifierDetector::new("test", config, config.init(&default_device()))
    }

    #[test]
    fn zero_threshold_reports_whole_frame() {
        let detector = detector()
            .with_min_score(0.0)
            .with_labels(vec!["background".into(), "drone".into()])
            .unwrap();
        let frame = Frame::solid(1, 0.0, 20, 10, [200, 10, 10, 255]);
        let detections = detector.detect(&frame).unwrap();

        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.bbox, BoundingBox::full_frame(20, 10));
        assert!(d.class == "background" || d.class == "drone");
        assert!(d.score >= 0.5);
    }

    #[test]
    fn unreachable_threshold_reports_nothing() {
        let detector = detector().with_min_score(1.5);
        let frame = Frame::solid(1, 0.0, 8, 8, [0, 0, 0, 255]);
        assert!(detector.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn label_count_must_match() {
        assert!(detector().with_labels(vec!["drone".into()]).is_err());
        assert_eq!(detector().labels(), ["class_0", "class_1"]);
    }

    #[test]
    fn store_loader() {
        let store = Arc::new(MemoryStore::new());
        let config = small();
        let model = config.init::<InferenceBackend>(&default_device());
        save_to_store(store.as_ref(), "drone-detection-model", &model, &config).unwrap();

        let loaded = StoreLoader::new(store.clone(), "drone-detection-model")
            .load()
            .unwrap();
        assert_eq!(loaded.name(), "drone-detection-model");

        let missing = StoreLoader::new(store, "other").load();
        assert!(matches!(missing, Err(DetectionError::ModelLoad(_))));
    }

    #[test]
    fn closures_are_loaders() {
        let loader = || -> Result<Box<dyn DetectionModel>> { Ok(Box::new(detector())) };
        assert_eq!(loader.load().unwrap().name(), "test");
    }
}
