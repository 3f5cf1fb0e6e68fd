use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Stub backend for running the pipeline without a model.
///
/// Candidates are derived from a SHA-256 digest of the pixels, so identical
/// frames always yield identical candidates and different frames usually differ.
pub struct StubBackend {
    labels: Vec<String>,
    max_candidates: usize,
}

impl StubBackend {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(anyhow!("stub backend needs at least one label"));
        }
        Ok(Self {
            labels,
            max_candidates: 6,
        })
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let digest: [u8; 32] = Sha256::digest(frame.pixels()).into();
        let width = frame.width() as f32;
        let height = frame.height() as f32;

        let count = digest[0] as usize % (self.max_candidates + 1);
        let candidates = digest[1..]
            .chunks_exact(5)
            .take(count)
            .map(|chunk| {
                let label = &self.labels[chunk[0] as usize % self.labels.len()];
                let confidence = chunk[1] as f32 / 255.0;
                let x1 = chunk[2] as f32 / 255.0 * width * 0.75;
                let y1 = chunk[3] as f32 / 255.0 * height * 0.75;
                let side = (chunk[4] as f32 / 255.0).max(0.1) * width.min(height) * 0.25;
                let bbox = BoundingBox::new(x1, y1, (x1 + side).min(width), (y1 + side).min(height));
                Detection::new(label.clone(), confidence, bbox)
            })
            .collect();
        Ok(candidates)
    }
}
