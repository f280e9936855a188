//! Per-video aggregation state.
//!
//! - `Aggregator`: flat detection log plus per-class confidence buckets.
//! - `Session`: the single analysis result held in memory, with its
//!   `Idle -> Analyzing -> Done` lifecycle.
//!
//! Both collections are appended together for every detected object, so the
//! number of log entries for a class always equals the length of its bucket.

use std::collections::BTreeMap;

use crate::detect::{ClassId, Detection};

/// One entry of the flat detection log.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRecord {
    pub frame_index: u64,
    pub class_id: ClassId,
    pub confidence: f32,
    /// Mask extent in frame pixels; `None` for box-only detections.
    pub mask_area: Option<u64>,
}

/// Mean confidence and sample count for one class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassSummary {
    pub average: f64,
    pub count: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    detections: Vec<DetectionRecord>,
    by_class: BTreeMap<ClassId, Vec<f32>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every detection and statistic.
    pub fn reset(&mut self) {
        self.detections.clear();
        self.by_class.clear();
    }

    pub fn record(&mut self, class_id: ClassId, confidence: f32, frame_index: u64) {
        self.push(DetectionRecord {
            frame_index,
            class_id,
            confidence,
            mask_area: None,
        });
    }

    /// Record a detection, keeping the mask extent when it has one.
    pub fn record_detection(&mut self, frame_index: u64, detection: &Detection) {
        self.push(DetectionRecord {
            frame_index,
            class_id: detection.class_id(),
            confidence: detection.confidence(),
            mask_area: detection.mask().map(|mask| mask.area()),
        });
    }

    fn push(&mut self, record: DetectionRecord) {
        self.by_class
            .entry(record.class_id)
            .or_default()
            .push(record.confidence);
        self.detections.push(record);
    }

    /// Per-class mean confidence and count, in ascending class order.
    pub fn summarize(&self) -> BTreeMap<ClassId, ClassSummary> {
        self.by_class
            .iter()
            .map(|(&class_id, confidences)| {
                let sum: f64 = confidences.iter().map(|&c| c as f64).sum();
                let count = confidences.len();
                (
                    class_id,
                    ClassSummary {
                        average: sum / count as f64,
                        count,
                    },
                )
            })
            .collect()
    }

    /// Flat detection log in recording order.
    pub fn detections(&self) -> &[DetectionRecord] {
        &self.detections
    }

    pub fn class_confidences(&self, class_id: ClassId) -> &[f32] {
        self.by_class
            .get(&class_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Class ids seen since the last reset, ascending.
    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.by_class.keys().copied()
    }

    pub fn total(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Analyzing,
    Done {
        aborted: bool,
    },
}

/// The one analysis result kept in memory.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    aggregator: Aggregator,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new analysis, discarding the previous result.
    pub fn begin(&mut self) {
        self.aggregator.reset();
        self.state = SessionState::Analyzing;
    }

    pub fn finish(&mut self, aborted: bool) {
        self.state = SessionState::Done { aborted };
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut Aggregator {
        &mut self.aggregator
    }
}
