//! The sequential analysis loop.
//!
//! One frame is read, processed and handed to a sink before the next frame is
//! read. The loop owns no threads; cancellation is observed between frames
//! through an `AtomicBool` that a signal handler (or a test) may set.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::config::validate_confidence;
use crate::ingest::FrameSource;
use crate::processor::FrameProcessor;
use crate::session::Session;

/// What the loop should do after a frame has been shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    Stop,
}

/// Receives annotated frames in stream order.
pub trait FrameSink {
    fn show(&mut self, frame_index: u64, image: &RgbImage) -> Result<SinkControl>;

    /// Release display or file resources. Called exactly once per run.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _frame_index: u64, _image: &RgbImage) -> Result<SinkControl> {
        Ok(SinkControl::Continue)
    }
}

/// Writes every `stride`-th annotated frame as `frame_NNNNNN.png`.
pub struct PngSink {
    dir: PathBuf,
    stride: u64,
    written: u64,
}

impl PngSink {
    pub fn new(dir: &Path, stride: u64) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            stride: stride.max(1),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn frame_path(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", frame_index))
    }
}

impl FrameSink for PngSink {
    fn show(&mut self, frame_index: u64, image: &RgbImage) -> Result<SinkControl> {
        if frame_index % self.stride == 0 {
            let path = self.frame_path(frame_index);
            image
                .save(&path)
                .with_context(|| format!("failed to write frame {}", path.display()))?;
            self.written += 1;
        }
        Ok(SinkControl::Continue)
    }

    fn close(&mut self) -> Result<()> {
        log::info!(
            "wrote {} annotated frames to {}",
            self.written,
            self.dir.display()
        );
        Ok(())
    }
}

/// Summary of one analysis run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub frames: u64,
    pub detections: usize,
    /// Stopped by the sink or the cancel flag before end of stream.
    pub aborted: bool,
}

struct SinkGuard<'a> {
    sink: &'a mut dyn FrameSink,
    closed: bool,
}

impl SinkGuard<'_> {
    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.sink.close()
    }
}

impl Drop for SinkGuard<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.sink.close() {
                log::warn!("failed to close frame sink: {:#}", err);
            }
        }
    }
}

/// Analyse `source` from its current position to end of stream.
///
/// The session is reset only after the threshold has been validated, so a
/// rejected run leaves earlier results in place. Detections recorded before
/// an error remain in the session.
pub fn run(
    source: &mut dyn FrameSource,
    processor: &mut FrameProcessor,
    session: &mut Session,
    sink: &mut dyn FrameSink,
    threshold: f32,
    cancel: &AtomicBool,
    frame_limit: Option<u64>,
) -> Result<AnalysisOutcome> {
    validate_confidence(threshold)?;

    session.begin();
    let mut guard = SinkGuard {
        sink,
        closed: false,
    };
    let result = drive(source, processor, session, &mut guard, threshold, cancel, frame_limit);
    let closed = guard.close();

    match result {
        Ok(outcome) => {
            session.finish(outcome.aborted);
            closed?;
            log::info!(
                "analysis of {} {}: {} frames, {} detections",
                source.describe(),
                if outcome.aborted { "aborted" } else { "complete" },
                outcome.frames,
                outcome.detections
            );
            Ok(outcome)
        }
        Err(err) => {
            session.finish(true);
            if let Err(close_err) = closed {
                log::warn!("failed to close frame sink: {:#}", close_err);
            }
            Err(err)
        }
    }
}

fn drive(
    source: &mut dyn FrameSource,
    processor: &mut FrameProcessor,
    session: &mut Session,
    guard: &mut SinkGuard<'_>,
    threshold: f32,
    cancel: &AtomicBool,
    frame_limit: Option<u64>,
) -> Result<AnalysisOutcome> {
    source
        .connect()
        .with_context(|| format!("failed to open {}", source.describe()))?;
    log::info!(
        "analysing {} with backend '{}' at confidence {:.2}",
        source.describe(),
        processor.backend_name(),
        threshold
    );

    let mut frames = 0u64;
    let mut aborted = false;
    loop {
        if cancel.load(Ordering::SeqCst) {
            log::info!("analysis cancelled after {} frames", frames);
            aborted = true;
            break;
        }
        if frame_limit.is_some_and(|limit| frames >= limit) {
            break;
        }
        let Some(frame) = source.next_frame()? else {
            break;
        };
        let annotated = processor.process(session, &frame, threshold)?;
        frames += 1;
        if guard.sink.show(frame.index, &annotated)? == SinkControl::Stop {
            log::info!("analysis stopped at frame {}", frame.index);
            aborted = true;
            break;
        }
    }

    Ok(AnalysisOutcome {
        frames,
        detections: session.aggregator().total(),
        aborted,
    })
}
