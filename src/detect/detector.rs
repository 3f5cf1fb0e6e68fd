use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::backends::StubBackend;
use crate::detect::labels::{coco_labels, read_labels_file};
use crate::detect::nms::{filter_confidence, non_max_suppression};
use crate::detect::result::Detection;
use crate::error::ModelLoadError;
use crate::frame::Frame;

/// Detection model behind a pure function contract.
///
/// `detect` is deterministic for a deterministic backend: same frame, same
/// thresholds, same detections in the same order.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
}

impl Detector {
    pub fn new(backend: Box<dyn DetectorBackend>) -> Self {
        Self { backend }
    }

    /// Build the configured backend and warm it up.
    ///
    /// Any failure here is fatal; callers should exit instead of running
    /// the playback loop without a model.
    pub fn load(settings: &DetectorSettings) -> Result<Self, ModelLoadError> {
        let name = settings.backend.as_str();
        let mut backend = build_backend(settings).map_err(|e| ModelLoadError::new(name, e))?;
        backend
            .warm_up()
            .map_err(|e| ModelLoadError::new(name, e.context("warm-up inference failed")))?;
        log::info!("detector backend '{}' loaded", backend.name());
        Ok(Self { backend })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run the model, drop candidates below `confidence_threshold`, then
    /// suppress same-class boxes with IoU >= `overlap_threshold`.
    pub fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        overlap_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let candidates = self.backend.infer(frame)?;
        let confident = filter_confidence(candidates, confidence_threshold);
        Ok(non_max_suppression(confident, overlap_threshold))
    }
}

fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let labels = match &settings.labels_path {
        Some(path) => read_labels_file(path)?,
        None => coco_labels(),
    };
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new(labels)?)),
        "tract" => build_tract(settings, labels),
        other => Err(anyhow!(
            "unknown detector backend '{}'; expected stub or tract",
            other
        )),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DetectorSettings, labels: Vec<String>) -> Result<Box<dyn DetectorBackend>> {
    use crate::detect::backends::TractBackend;

    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
    Ok(Box::new(TractBackend::new(
        model_path,
        settings.input_size,
        labels,
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(
    _settings: &DetectorSettings,
    _labels: Vec<String>,
) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!("tract backend requires the backend-tract feature"))
}
