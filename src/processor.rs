//! Per-frame detection, recording and overlay.

use anyhow::{Context, Result};
use image::RgbImage;

use crate::classes::ClassNames;
use crate::detect::{DetectorBackend, Detection};
use crate::frame::Frame;
use crate::overlay::{self, LabelAnchor, LabelFont, MASK_ALPHA};
use crate::session::Session;

/// Runs the detector on one frame at a time and renders the result.
pub struct FrameProcessor {
    backend: Box<dyn DetectorBackend>,
    classes: ClassNames,
    font: Option<LabelFont>,
    warned_no_font: bool,
}

impl FrameProcessor {
    pub fn new(backend: Box<dyn DetectorBackend>, classes: ClassNames) -> Self {
        Self {
            backend,
            classes,
            font: None,
            warned_no_font: false,
        }
    }

    /// Render labels with `font`. Without a font only shapes are drawn.
    pub fn with_font(mut self, font: LabelFont) -> Self {
        self.font = Some(font);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn classes(&self) -> &ClassNames {
        &self.classes
    }

    /// Detect, record every detection into `session`, and return the
    /// annotated copy of the frame.
    pub fn process(
        &mut self,
        session: &mut Session,
        frame: &Frame,
        threshold: f32,
    ) -> Result<RgbImage> {
        let raw = self
            .backend
            .detect(frame, threshold)
            .with_context(|| format!("detection failed on frame {}", frame.index))?;
        let detections = normalize(raw, frame);

        let aggregator = session.aggregator_mut();
        for detection in &detections {
            aggregator.record_detection(frame.index, detection);
        }

        let mut annotated = frame.image().clone();
        self.render(&mut annotated, &detections);
        log::debug!(
            "frame {}: {} detections ({} masked)",
            frame.index,
            detections.len(),
            detections.iter().filter(|d| d.mask().is_some()).count()
        );
        Ok(annotated)
    }

    fn render(&mut self, image: &mut RgbImage, detections: &[Detection]) {
        if self.font.is_none() && !detections.is_empty() && !self.warned_no_font {
            log::warn!("no label font configured; drawing detections without labels");
            self.warned_no_font = true;
        }
        for detection in detections {
            let color = overlay::class_color(detection.class_id());
            let text = overlay::label_text(
                &self.classes.name(detection.class_id()),
                detection.confidence(),
            );
            match detection {
                Detection::Masked { mask, .. } => {
                    overlay::blend_mask(image, mask, color, MASK_ALPHA);
                    let Some(boundary) = overlay::outer_boundary(mask) else {
                        log::debug!("empty mask for class {}", detection.class_id());
                        continue;
                    };
                    overlay::draw_boundary(image, &boundary, color);
                    if let (Some(font), Some((cx, cy))) =
                        (&self.font, overlay::centroid(&boundary))
                    {
                        font.draw(image, &text, LabelAnchor::Center(cx, cy), color);
                    }
                }
                Detection::Boxed { bbox, .. } => {
                    overlay::draw_box(image, bbox, color);
                    if let Some(font) = &self.font {
                        font.draw(image, &text, LabelAnchor::Above(bbox.x1, bbox.y1), color);
                    }
                }
            }
        }
    }
}

/// Bring masks to frame resolution and clamp confidences to `[0, 1]`.
fn normalize(detections: Vec<Detection>, frame: &Frame) -> Vec<Detection> {
    detections
        .into_iter()
        .map(|detection| match detection {
            Detection::Boxed {
                class_id,
                confidence,
                bbox,
            } => Detection::Boxed {
                class_id,
                confidence: confidence.clamp(0.0, 1.0),
                bbox,
            },
            Detection::Masked {
                class_id,
                confidence,
                bbox,
                mask,
            } => Detection::Masked {
                class_id,
                confidence: confidence.clamp(0.0, 1.0),
                bbox,
                mask: mask.resized(frame.width(), frame.height()),
            },
        })
        .collect()
}
