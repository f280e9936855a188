//! Built-in detector backends.
//!
//! - `cpu`: colour-blob segmenter, no model weights
//! - `stub`: scripted detections per frame index
//! - `tract`: YOLO ONNX exports (feature: backend-tract)

mod cpu;
mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use cpu::CpuBackend;
pub use stub::StubBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
