//! Frame ingestion sources.
//!
//! This module provides sequential sources of decoded frames:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` scenes (testing, demos)
//!
//! A source yields frames in stream order with consecutive indices starting
//! at 0, and `Ok(None)` once the stream is exhausted. Sources release their
//! decoder state when dropped.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use anyhow::Result;

use crate::frame::Frame;

pub use file::{FileConfig, FileSource, FileStats};

/// A sequential video stream.
pub trait FrameSource {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Prepare the stream. Called once before the first `next_frame`.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Next frame in stream order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Frames produced so far.
    fn frames_captured(&self) -> u64;
}
