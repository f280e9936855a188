//! Detection overlay rendering.
//!
//! Colours are keyed by class id through a seeded generator, so a class keeps
//! its colour across frames and across runs. Masks are blended with a fixed
//! alpha and outlined along their outer boundary; boxes are drawn as hollow
//! rectangles.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::{BoundingBox, ClassId, Mask};

/// Weight of the class colour when filling a mask.
pub const MASK_ALPHA: f32 = 0.5;

const LABEL_SCALE: f32 = 18.0;
const LABEL_PADDING: i32 = 2;
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

/// Deterministic colour for a class.
pub fn class_color(class_id: ClassId) -> Rgb<u8> {
    let mut rng = StdRng::seed_from_u64(class_id as u64);
    Rgb([
        rng.gen_range(64..=255),
        rng.gen_range(64..=255),
        rng.gen_range(64..=255),
    ])
}

/// Label text: class name and confidence as a whole percentage.
pub fn label_text(name: &str, confidence: f32) -> String {
    format!("{} {:.0}%", name, confidence * 100.0)
}

// ----------------------------------------------------------------------------
// Masks
// ----------------------------------------------------------------------------

/// Alpha-blend `color` over every pixel inside `mask`.
///
/// The mask must already be at image resolution.
pub fn blend_mask(image: &mut RgbImage, mask: &Mask, color: Rgb<u8>, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let width = image.width().min(mask.width());
    let height = image.height().min(mask.height());
    for y in 0..height {
        for x in 0..width {
            if !mask.get(x, y) {
                continue;
            }
            let pixel = image.get_pixel_mut(x, y);
            for (channel, tint) in pixel.0.iter_mut().zip(color.0) {
                let mixed = (1.0 - alpha) * (*channel as f32) + alpha * (tint as f32);
                *channel = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Longest outer contour of the mask, or `None` for an empty mask.
pub fn outer_boundary(mask: &Mask) -> Option<Vec<Point<i32>>> {
    if mask.is_empty() {
        return None;
    }
    find_contours::<i32>(&mask.to_gray())
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| contour.points)
        .filter(|points| !points.is_empty())
        .max_by_key(|points| points.len())
}

/// Mean of the boundary points.
pub fn centroid(points: &[Point<i32>]) -> Option<(f32, f32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points.iter().fold((0.0f32, 0.0f32), |(sx, sy), p| {
        (sx + p.x as f32, sy + p.y as f32)
    });
    Some((sx / n, sy / n))
}

/// Draw a closed polyline through the boundary points.
pub fn draw_boundary(image: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    match points {
        [] => {}
        [p] => {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < image.width() && (p.y as u32) < image.height()
            {
                image.put_pixel(p.x as u32, p.y as u32, color);
            }
        }
        _ => {
            for (i, start) in points.iter().enumerate() {
                let end = &points[(i + 1) % points.len()];
                draw_line_segment_mut(
                    image,
                    (start.x as f32, start.y as f32),
                    (end.x as f32, end.y as f32),
                    color,
                );
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Boxes
// ----------------------------------------------------------------------------

/// Two-pixel hollow rectangle, clipped to the image.
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let x = bbox.x1.round() as i32;
    let y = bbox.y1.round() as i32;
    let w = bbox.width().round() as u32;
    let h = bbox.height().round() as u32;
    if w == 0 || h == 0 {
        return;
    }
    draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), color);
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(image, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
    }
}

// ----------------------------------------------------------------------------
// Labels
// ----------------------------------------------------------------------------

/// Where a label is anchored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LabelAnchor {
    /// Text box centred on the point.
    Center(f32, f32),
    /// Text box sitting just above the point (box top-left corner).
    Above(f32, f32),
}

/// Top-left corner of a `bw` x `bh` label box at `anchor`, kept inside a
/// `width` x `height` image when it fits.
pub fn label_origin(anchor: LabelAnchor, bw: i32, bh: i32, width: u32, height: u32) -> (i32, i32) {
    let (x, y) = match anchor {
        LabelAnchor::Center(cx, cy) => (cx as i32 - bw / 2, cy as i32 - bh / 2),
        LabelAnchor::Above(x, y) => (x as i32, y as i32 - bh),
    };
    (
        x.clamp(0, (width as i32 - bw).max(0)),
        y.clamp(0, (height as i32 - bh).max(0)),
    )
}

/// TrueType font used for labels.
pub struct LabelFont {
    font: FontVec,
    scale: PxScale,
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        Self::from_bytes(bytes)
            .with_context(|| format!("failed to parse font {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font: {}", e))?;
        Ok(Self {
            font,
            scale: PxScale::from(LABEL_SCALE),
        })
    }

    /// Draw `text` on a filled `background` box at `anchor`, clamped on-screen.
    pub fn draw(&self, image: &mut RgbImage, text: &str, anchor: LabelAnchor, background: Rgb<u8>) {
        let (tw, th) = text_size(self.scale, &self.font, text);
        let bw = tw as i32 + 2 * LABEL_PADDING;
        let bh = th as i32 + 2 * LABEL_PADDING;
        let (x, y) = label_origin(anchor, bw, bh, image.width(), image.height());

        if bw > 0 && bh > 0 {
            draw_filled_rect_mut(image, Rect::at(x, y).of_size(bw as u32, bh as u32), background);
        }
        draw_text_mut(
            image,
            LABEL_TEXT,
            x + LABEL_PADDING,
            y + LABEL_PADDING,
            self.scale,
            &self.font,
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_color_is_stable() {
        for class_id in [0, 1, 2, 17, 1_000] {
            assert_eq!(class_color(class_id), class_color(class_id));
        }
        let colors: Vec<_> = (0..4).map(class_color).collect();
        let again: Vec<_> = (0..4).map(class_color).collect();
        assert_eq!(colors, again);
        assert!(colors.iter().all(|c| c.0.iter().all(|&v| v >= 64)));
    }

    #[test]
    fn blend_only_touches_masked_pixels() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let mask = Mask::from_fn(4, 4, |x, y| x == 1 && y == 2);
        blend_mask(&mut image, &mask, Rgb([200, 0, 100]), MASK_ALPHA);
        assert_eq!(image.get_pixel(1, 2), &Rgb([150, 50, 100]));
        assert_eq!(image.get_pixel(0, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn boundary_of_square_is_centred() {
        let mask = Mask::from_fn(10, 10, |x, y| (2..=7).contains(&x) && (2..=7).contains(&y));
        let points = outer_boundary(&mask).unwrap();
        assert!(points.iter().all(|p| (2..=7).contains(&p.x) && (2..=7).contains(&p.y)));
        let (cx, cy) = centroid(&points).unwrap();
        assert!((cx - 4.5).abs() < 0.25);
        assert!((cy - 4.5).abs() < 0.25);
    }

    #[test]
    fn empty_mask_has_no_boundary() {
        let mask = Mask::from_fn(5, 5, |_, _| false);
        assert!(outer_boundary(&mask).is_none());
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn box_outline_leaves_interior() {
        let mut image = RgbImage::new(10, 10);
        let color = Rgb([1, 2, 3]);
        draw_box(&mut image, &BoundingBox::new(1.0, 1.0, 9.0, 9.0), color);
        assert_eq!(image.get_pixel(1, 1), &color);
        assert_eq!(image.get_pixel(2, 2), &color);
        assert_eq!(image.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn box_label_sits_above_top_left_corner() {
        assert_eq!(
            label_origin(LabelAnchor::Above(50.0, 100.0), 72, 13, 200, 200),
            (50, 87)
        );
    }

    #[test]
    fn mask_label_is_centred_on_point() {
        assert_eq!(
            label_origin(LabelAnchor::Center(100.0, 100.0), 72, 13, 200, 200),
            (64, 94)
        );
    }

    #[test]
    fn labels_are_clamped_on_screen() {
        // Box touching the top edge: the label drops inside the image.
        assert_eq!(
            label_origin(LabelAnchor::Above(10.0, 0.0), 40, 12, 200, 200),
            (10, 0)
        );
        // Centroid near the right edge.
        assert_eq!(
            label_origin(LabelAnchor::Center(195.0, 50.0), 40, 12, 200, 200),
            (160, 44)
        );
        // Box past the bottom-left corner.
        assert_eq!(
            label_origin(LabelAnchor::Above(-30.0, 400.0), 40, 12, 200, 200),
            (0, 188)
        );
        // Label wider than the image pins to the origin.
        assert_eq!(
            label_origin(LabelAnchor::Center(5.0, 5.0), 300, 12, 200, 200),
            (0, 0)
        );
    }

    #[test]
    fn label_text_rounds_percentage() {
        assert_eq!(label_text("crack", 0.876), "crack 88%");
    }
}
