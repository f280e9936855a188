//! Local file frame source.
//!
//! This module provides `FileSource` for reading frames from local video files.
//! The file source is responsible for:
//! - Reading frames from a local video file (no network access)
//! - Decoding video frames in-memory to RGB24
//! - Numbering frames in stream order
//!
//! `stub://` paths produce a deterministic synthetic scene instead of decoding
//! a file: three saturated squares (red, green, blue) moving over a dark
//! background, for a fixed number of frames.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;
use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "/data/inspection/run_04.mp4") or `stub://<name>`.
    pub path: String,
    /// Length of a synthetic `stub://` stream.
    pub synthetic_frames: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            synthetic_frames: 100,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)),
            })
        } else {
            if !std::path::Path::new(&config.path).is_file() {
                return Err(anyhow!("video file {} does not exist", config.path));
            }
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        self.stats().path
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn frames_captured(&self) -> u64 {
        self.stats().frames_captured
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.frame_count >= self.config.synthetic_frames {
            return None;
        }
        let index = self.frame_count;
        self.frame_count += 1;
        Some(Frame::new(index, synthetic_scene(index)))
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

/// Frame `index` of the synthetic scene.
///
/// Background channels stay below 48; the squares never overlap.
pub(crate) fn synthetic_scene(index: u64) -> RgbImage {
    let (w, h) = (SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT);
    let mut image = RgbImage::from_fn(w, h, |x, y| {
        let v = ((x as u64 + y as u64 + index) % 48) as u8;
        Rgb([v, v, v])
    });

    let red_x = ((index * 8) % (w as u64 - 60)) as u32;
    fill(&mut image, red_x, 40, 60, 60, Rgb([220, 30, 30]));

    let green_y = 120 + ((index * 6) % (h as u64 - 180)) as u32;
    fill(&mut image, 500, green_y, 60, 60, Rgb([30, 200, 40]));

    if (index / 25) % 2 == 0 {
        fill(&mut image, 100, 320, 80, 50, Rgb([20, 40, 240]));
    }
    image
}

fn fill(image: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
    for y in y0..(y0 + h).min(image.height()) {
        for x in x0..(x0 + w).min(image.width()) {
            image.put_pixel(x, y, color);
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
