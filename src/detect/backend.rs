use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detection capabilities supported by backends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Axis-aligned boxes only.
    ObjectDetection,
    /// Per-pixel masks in addition to boxes.
    Segmentation,
}

/// Detector backend trait.
///
/// Given a frame and a confidence threshold, a backend produces the detections
/// at or above that threshold. Model weights, pre-processing and inference are
/// private to the backend.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on a frame.
    ///
    /// Masks, when present, may be at any resolution; callers resize them to
    /// the frame before drawing.
    fn detect(&mut self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
