use std::sync::atomic::AtomicBool;

use anyhow::Result;
use image::RgbImage;

use surface_detector::analysis::{self, FrameSink, NullSink, SinkControl};
use surface_detector::{
    export_csv, load_backend, BoundingBox, ClassNames, Detection, DetectorBackend, FileConfig, FileSource,
    Frame, FrameProcessor, ModelSettings, Session, SessionState,
};
use surface_detector::detect::{DetectionCapability, StubBackend};

fn synthetic(frames: u64) -> FileSource {
    FileSource::new(FileConfig {
        path: "stub://pipeline".to_string(),
        synthetic_frames: frames,
    })
    .expect("synthetic source")
}

fn cpu_processor() -> FrameProcessor {
    let backend = load_backend(&ModelSettings::default()).expect("cpu backend");
    FrameProcessor::new(backend, ClassNames::from_list(["red", "green", "blue"]))
}

#[test]
fn cpu_backend_over_synthetic_video() {
    let mut source = synthetic(30);
    let mut processor = cpu_processor();
    let mut session = Session::new();
    let cancel = AtomicBool::new(false);

    let outcome = analysis::run(
        &mut source,
        &mut processor,
        &mut session,
        &mut NullSink,
        0.25,
        &cancel,
        None,
    )
    .expect("analysis");

    assert_eq!(outcome.frames, 30);
    assert!(!outcome.aborted);
    assert_eq!(session.state(), SessionState::Done { aborted: false });

    // Red and green squares are in every frame; blue is shown for frames 0..25.
    let summary = session.aggregator().summarize();
    assert_eq!(summary.len(), 3);
    assert_eq!(summary[&0].count, 30);
    assert_eq!(summary[&1].count, 30);
    assert_eq!(summary[&2].count, 25);
    assert_eq!(outcome.detections, 85);
    assert!((summary[&0].average - 220.0 / 255.0).abs() < 1e-4);

    let records = session.aggregator().detections();
    assert!(records.iter().all(|r| r.mask_area.is_some()));
    assert_eq!(records[0].frame_index, 0);
    assert_eq!(records[0].mask_area, Some(3600));
    assert!(records
        .windows(2)
        .all(|pair| pair[0].frame_index <= pair[1].frame_index));
}

#[test]
fn threshold_filters_weaker_classes() {
    let mut source = synthetic(5);
    let mut processor = cpu_processor();
    let mut session = Session::new();
    let cancel = AtomicBool::new(false);

    analysis::run(
        &mut source,
        &mut processor,
        &mut session,
        &mut NullSink,
        0.9,
        &cancel,
        None,
    )
    .expect("analysis");

    // Only the blue square (240/255) clears 0.9.
    let classes: Vec<_> = session.aggregator().classes().collect();
    assert_eq!(classes, vec![2]);
}

#[test]
fn new_analysis_discards_previous_results() {
    let mut processor = cpu_processor();
    let mut session = Session::new();
    let cancel = AtomicBool::new(false);

    for frames in [10, 3] {
        let mut source = synthetic(frames);
        analysis::run(
            &mut source,
            &mut processor,
            &mut session,
            &mut NullSink,
            0.25,
            &cancel,
            None,
        )
        .expect("analysis");
    }
    assert_eq!(session.aggregator().total(), 9);
    assert!(session
        .aggregator()
        .detections()
        .iter()
        .all(|r| r.frame_index < 3));
}

#[test]
fn invalid_threshold_keeps_previous_session() {
    let mut processor = cpu_processor();
    let mut session = Session::new();
    let cancel = AtomicBool::new(false);

    let mut source = synthetic(2);
    analysis::run(
        &mut source,
        &mut processor,
        &mut session,
        &mut NullSink,
        0.25,
        &cancel,
        None,
    )
    .expect("analysis");
    let before = session.aggregator().total();
    assert!(before > 0);

    for threshold in [0.0, -0.1, 1.5] {
        let mut source = synthetic(2);
        let err = analysis::run(
            &mut source,
            &mut processor,
            &mut session,
            &mut NullSink,
            threshold,
            &cancel,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence threshold"));
    }
    assert_eq!(session.aggregator().total(), before);
    assert_eq!(session.state(), SessionState::Done { aborted: false });
}

#[test]
fn cancel_flag_stops_before_first_frame() {
    let mut source = synthetic(10);
    let mut processor = cpu_processor();
    let mut session = Session::new();
    let cancel = AtomicBool::new(true);

    let outcome = analysis::run(
        &mut source,
        &mut processor,
        &mut session,
        &mut NullSink,
        0.25,
        &cancel,
        None,
    )
    .expect("analysis");
    assert_eq!(outcome.frames, 0);
    assert!(outcome.aborted);
    assert!(session.aggregator().is_empty());
    assert_eq!(session.state(), SessionState::Done { aborted: true });
}

struct FailingBackend;

impl DetectorBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        capability == DetectionCapability::ObjectDetection
    }

    fn detect(&mut self, frame: &Frame, _threshold: f32) -> Result<Vec<Detection>> {
        if frame.index == 2 {
            anyhow::bail!("inference exploded");
        }
        Ok(vec![Detection::Boxed {
            class_id: 4,
            confidence: 0.5,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        }])
    }
}

struct ClosingSink {
    closed: bool,
}

impl FrameSink for ClosingSink {
    fn show(&mut self, _frame_index: u64, _image: &RgbImage) -> Result<SinkControl> {
        Ok(SinkControl::Continue)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[test]
fn backend_error_aborts_but_keeps_recorded_frames() {
    let mut source = synthetic(10);
    let mut processor = FrameProcessor::new(Box::new(FailingBackend), ClassNames::new());
    let mut session = Session::new();
    let mut sink = ClosingSink { closed: false };
    let cancel = AtomicBool::new(false);

    let err = analysis::run(
        &mut source,
        &mut processor,
        &mut session,
        &mut sink,
        0.25,
        &cancel,
        None,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("inference exploded"));
    assert!(sink.closed);
    assert_eq!(session.aggregator().total(), 2);
    assert_eq!(session.aggregator().class_confidences(4), &[0.5, 0.5]);
    assert_eq!(session.state(), SessionState::Done { aborted: true });
}

#[test]
fn partial_results_export_after_backend_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("partial.csv");
    let mut source = synthetic(10);
    let mut processor = FrameProcessor::new(Box::new(FailingBackend), ClassNames::new());
    let mut session = Session::new();
    let cancel = AtomicBool::new(false);

    let result = analysis::run(
        &mut source,
        &mut processor,
        &mut session,
        &mut NullSink,
        0.25,
        &cancel,
        None,
    );
    assert!(result.is_err());

    export_csv(&path, session.aggregator(), processor.classes()).expect("export partial");
    let text = std::fs::read_to_string(&path).expect("read report");
    assert!(text.contains("4;0.5000;2"));
    assert!(text.lines().any(|line| line == "0;4;0.5000;"));
    assert!(text.lines().any(|line| line == "1;4;0.5000;"));
    assert!(!text.lines().any(|line| line.starts_with("2;")));
}

#[test]
fn scripted_boxes_below_threshold_are_dropped() {
    let backend = StubBackend::new().with_frame(
        1,
        vec![
            Detection::Boxed {
                class_id: 7,
                confidence: 0.3,
                bbox: BoundingBox::new(10.0, 10.0, 40.0, 40.0),
            },
            Detection::Boxed {
                class_id: 8,
                confidence: 0.1,
                bbox: BoundingBox::new(50.0, 50.0, 60.0, 60.0),
            },
        ],
    );
    let mut processor = FrameProcessor::new(Box::new(backend), ClassNames::new());
    let mut session = Session::new();
    let cancel = AtomicBool::new(false);
    let mut source = synthetic(3);

    analysis::run(
        &mut source,
        &mut processor,
        &mut session,
        &mut NullSink,
        0.25,
        &cancel,
        None,
    )
    .expect("analysis");

    let records = session.aggregator().detections();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].class_id, 7);
    assert_eq!(records[0].frame_index, 1);
    assert_eq!(records[0].mask_area, None);
}
