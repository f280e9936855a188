use std::collections::HashMap;

use anyhow::Result;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub backend for testing. Replays scripted detections keyed by frame index.
///
/// Frames without a script entry yield no detections. Detections below the
/// requested threshold are filtered out, as a real model would.
#[derive(Default)]
pub struct StubBackend {
    script: HashMap<u64, Vec<Detection>>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the detections returned for one frame.
    pub fn with_frame(mut self, frame_index: u64, detections: Vec<Detection>) -> Self {
        self.script.insert(frame_index, detections);
        self
    }

    /// Number of `detect` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::ObjectDetection | DetectionCapability::Segmentation
        )
    }

    fn detect(&mut self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        self.calls += 1;
        Ok(self
            .script
            .get(&frame.index)
            .map(|detections| {
                detections
                    .iter()
                    .filter(|d| d.confidence() >= threshold)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
