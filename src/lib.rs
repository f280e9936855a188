//! Surface Detector
//!
//! Frame-by-frame analysis of inspection videos with a YOLO-style detector.
//!
//! Every frame is run through a detector backend; detections are drawn on a
//! copy of the frame (masks filled and outlined, boxes as a fallback) and
//! recorded into the current session. When the video ends the session holds a
//! per-class confidence summary and a flat detection log, which can be
//! exported as a CSV report.
//!
//! # Module Structure
//!
//! - `frame`: decoded RGB frame with its stream index
//! - `ingest`: sequential frame sources (local files, synthetic `stub://` scenes)
//! - `detect`: detector backends, detections, model loading
//! - `classes`: class-id to name lookup
//! - `overlay`: class colours, mask fill, boundaries, labels
//! - `processor`: per-frame detect, record and draw
//! - `session`: aggregation and session lifecycle
//! - `analysis`: the frame loop and frame sinks
//! - `report`: CSV export
//! - `config`: file and environment configuration

pub mod analysis;
pub mod classes;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod processor;
pub mod report;
pub mod session;

pub use analysis::{AnalysisOutcome, FrameSink, NullSink, PngSink, SinkControl};
pub use classes::ClassNames;
pub use config::{AnalyzerConfig, ModelSettings};
pub use detect::{
    load_backend, BackendRegistry, BoundingBox, ClassId, Detection, DetectionCapability,
    DetectorBackend, Mask,
};
pub use frame::Frame;
pub use ingest::{FileConfig, FileSource, FrameSource};
pub use overlay::{class_color, LabelFont, MASK_ALPHA};
pub use processor::FrameProcessor;
pub use report::{export_csv, write_report};
pub use session::{Aggregator, ClassSummary, DetectionRecord, Session, SessionState};
