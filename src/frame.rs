//! Decoded video frames.
//!
//! - `Frame`: one RGB raster and its 0-based position in the stream.
//!
//! Frames are produced by the ingestion layer, consumed by a detector backend
//! and copied exactly once per frame for the annotated overlay.

use anyhow::{anyhow, Result};
use image::RgbImage;

// ----------------------------------------------------------------------------
// Frame: one decoded picture
// ----------------------------------------------------------------------------

/// One decoded frame. Pixels are packed RGB24, row-major.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Position in the source stream, starting at 0.
    pub index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Wrap a packed RGB24 buffer. The buffer length must match the dimensions.
    pub fn from_rgb(index: u64, pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("invalid {}x{} RGB frame", width, height))?;
        Ok(Self { index, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Raw RGB24 bytes, for backends that build their own tensors.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}
