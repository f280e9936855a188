use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{BoundingBox, ClassId, Detection, Mask};
use crate::frame::Frame;

/// Channel value a pixel must reach to count as foreground.
const FOREGROUND_LEVEL: u8 = 128;
/// Components smaller than this many pixels are treated as noise.
const MIN_AREA: u64 = 16;

/// CPU backend that segments saturated colour blobs.
///
/// Each 8-connected foreground component becomes a masked detection. The class
/// is the dominant channel (0 = red, 1 = green, 2 = blue) and the confidence is
/// the mean strength of that channel over the component.
#[derive(Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Clone, Copy)]
struct Blob {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u64,
    channel_sums: [u64; 3],
}

impl Blob {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 0,
            channel_sums: [0; 3],
        }
    }

    fn add(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
        for (sum, value) in self.channel_sums.iter_mut().zip(rgb) {
            *sum += value as u64;
        }
    }

    fn dominant(&self) -> (ClassId, f32) {
        let (channel, sum) = self
            .channel_sums
            .iter()
            .enumerate()
            .max_by_key(|(_, sum)| **sum)
            .map(|(channel, sum)| (channel, *sum))
            .unwrap_or((0, 0));
        let mean = sum as f32 / (self.area.max(1) as f32 * 255.0);
        (channel as ClassId, mean.clamp(0.0, 1.0))
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::ObjectDetection | DetectionCapability::Segmentation
        )
    }

    fn detect(&mut self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        let image = frame.image();
        let foreground = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let p = image.get_pixel(x, y);
            if p.0.iter().any(|&c| c >= FOREGROUND_LEVEL) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let labels = connected_components(&foreground, Connectivity::Eight, Luma([0u8]));

        let mut blobs: Vec<Option<Blob>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if blobs.len() <= label {
                blobs.resize(label + 1, None);
            }
            blobs[label]
                .get_or_insert_with(|| Blob::new(x, y))
                .add(x, y, image.get_pixel(x, y).0);
        }

        let mut detections = Vec::new();
        for (label, blob) in blobs.iter().enumerate() {
            let Some(blob) = blob else {
                continue;
            };
            if blob.area < MIN_AREA {
                continue;
            }
            let (class_id, confidence) = blob.dominant();
            if confidence < threshold {
                continue;
            }
            let label = label as u32;
            let mask = Mask::from_fn(labels.width(), labels.height(), |x, y| {
                labels.get_pixel(x, y)[0] == label
            });
            detections.push(Detection::Masked {
                class_id,
                confidence,
                bbox: BoundingBox::new(
                    blob.min_x as f32,
                    blob.min_y as f32,
                    (blob.max_x + 1) as f32,
                    (blob.max_y + 1) as f32,
                ),
                mask,
            });
        }
        log::debug!(
            "cpu backend: frame {} -> {} blobs",
            frame.index,
            detections.len()
        );
        Ok(detections)
    }
}
