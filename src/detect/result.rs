use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

/// Numeric class identifier as reported by the model.
pub type ClassId = u32;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix2 <= ix1 || iy2 <= iy1 {
            return 0.0;
        }
        let inter = (ix2 - ix1) * (iy2 - iy1);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Per-pixel object extent. Row-major, `true` inside the object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Mask {
    /// Returns `None` when `data` does not hold exactly `width * height` cells.
    pub fn new(width: u32, height: u32, data: Vec<bool>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Number of cells inside the object.
    pub fn area(&self) -> u64 {
        self.data.iter().filter(|&&cell| cell).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&cell| cell)
    }

    /// Binary image (255 inside, 0 outside) at the mask's own resolution.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    /// Nearest-neighbour resize, so the result stays strictly binary.
    pub fn resized(&self, width: u32, height: u32) -> Mask {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return Mask::from_fn(width, height, |_, _| false);
        }
        let scaled = imageops::resize(&self.to_gray(), width, height, FilterType::Nearest);
        Mask::from_fn(width, height, |x, y| scaled.get_pixel(x, y)[0] > 127)
    }
}

/// One recognised object in one frame.
///
/// Mask-bearing and box-only detections are distinct variants; renderers and
/// the session dispatch on the variant instead of probing for a mask.
#[derive(Clone, Debug, PartialEq)]
pub enum Detection {
    Boxed {
        class_id: ClassId,
        confidence: f32,
        bbox: BoundingBox,
    },
    Masked {
        class_id: ClassId,
        confidence: f32,
        bbox: BoundingBox,
        mask: Mask,
    },
}

impl Detection {
    pub fn class_id(&self) -> ClassId {
        match self {
            Detection::Boxed { class_id, .. } | Detection::Masked { class_id, .. } => *class_id,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Detection::Boxed { confidence, .. } | Detection::Masked { confidence, .. } => {
                *confidence
            }
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        match self {
            Detection::Boxed { bbox, .. } | Detection::Masked { bbox, .. } => bbox,
        }
    }

    pub fn mask(&self) -> Option<&Mask> {
        match self {
            Detection::Boxed { .. } => None,
            Detection::Masked { mask, .. } => Some(mask),
        }
    }
}
