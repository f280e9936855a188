#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{BoundingBox, ClassId, Detection, Mask};
use crate::frame::Frame;

/// Number of mask coefficients per anchor in YOLOv8/11 segmentation heads.
const MASK_COEFFS: usize = 32;

/// Tract-based backend for YOLO ONNX exports (detect and segment heads).
///
/// The frame is stretched to the model input, decoded anchor by anchor,
/// suppressed per class, and mapped back to frame coordinates. Segmentation
/// exports yield masked detections at prototype resolution.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    iou_threshold: f32,
}

struct Candidate {
    class_id: ClassId,
    confidence: f32,
    bbox: BoundingBox,
    coeffs: Vec<f32>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            iou_threshold: 0.45,
        })
    }

    /// Override the default NMS IoU threshold.
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = image::imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        input.into_tensor()
    }
}

/// Decode a `[rows, anchors]` YOLO head into candidates at or above `threshold`.
///
/// Rows are `cx, cy, w, h`, one score per class, then the mask coefficients
/// when `has_masks`. `scale` maps model-input coordinates to the frame.
fn decode(
    output0: &[f32],
    rows: usize,
    anchors: usize,
    has_masks: bool,
    threshold: f32,
    scale: (f32, f32),
) -> Vec<Candidate> {
    let classes = if has_masks {
        rows.saturating_sub(4 + MASK_COEFFS)
    } else {
        rows.saturating_sub(4)
    };
    let mask_start = rows.saturating_sub(MASK_COEFFS);
    let at = |row: usize, anchor: usize| output0[row * anchors + anchor];

    let mut candidates = Vec::new();
    for i in 0..anchors {
        let mut best = 0.0f32;
        let mut class_id = 0usize;
        for c in 0..classes {
            let score = at(4 + c, i);
            if score > best {
                best = score;
                class_id = c;
            }
        }
        if best < threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let coeffs = if has_masks {
            (0..MASK_COEFFS).map(|m| at(mask_start + m, i)).collect()
        } else {
            Vec::new()
        };
        candidates.push(Candidate {
            class_id: class_id as ClassId,
            confidence: best.clamp(0.0, 1.0),
            bbox: BoundingBox::new(
                (cx - w / 2.0) * scale.0,
                (cy - h / 2.0) * scale.1,
                (cx + w / 2.0) * scale.0,
                (cy + h / 2.0) * scale.1,
            ),
            coeffs,
        });
    }
    candidates
}

/// Greedy per-class NMS, highest confidence first.
fn suppress(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Candidate> = Vec::new();
    for cand in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && k.bbox.iou(&cand.bbox) > iou_threshold);
        if !overlaps {
            kept.push(cand);
        }
    }
    kept
}

/// Build a prototype-resolution mask for one candidate, cropped to its box.
fn proto_mask(
    cand: &Candidate,
    protos: &[f32],
    (mw, mh): (usize, usize),
    frame_size: (u32, u32),
) -> Mask {
    let sx = mw as f32 / frame_size.0 as f32;
    let sy = mh as f32 / frame_size.1 as f32;
    let x1 = (cand.bbox.x1 * sx).floor().max(0.0) as u32;
    let y1 = (cand.bbox.y1 * sy).floor().max(0.0) as u32;
    let x2 = (cand.bbox.x2 * sx).ceil().min(mw as f32) as u32;
    let y2 = (cand.bbox.y2 * sy).ceil().min(mh as f32) as u32;
    let plane = mw * mh;

    Mask::from_fn(mw as u32, mh as u32, |x, y| {
        if x < x1 || x >= x2 || y < y1 || y >= y2 {
            return false;
        }
        let offset = y as usize * mw + x as usize;
        let sum: f32 = cand
            .coeffs
            .iter()
            .enumerate()
            .map(|(k, coeff)| coeff * protos[k * plane + offset])
            .sum();
        // sigmoid(sum) > 0.5
        sum > 0.0
    })
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::ObjectDetection | DetectionCapability::Segmentation
        )
    }

    fn detect(&mut self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        let output0 = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = output0.shape().to_vec();
        if shape.len() != 3 {
            return Err(anyhow!("unexpected detection output shape {:?}", shape));
        }
        let (rows, anchors) = (shape[1], shape[2]);
        let output0: Vec<f32> = output0.iter().copied().collect();

        let protos = match outputs.get(1) {
            Some(tensor) => {
                let view = tensor
                    .to_array_view::<f32>()
                    .context("prototype tensor was not f32")?;
                let shape = view.shape().to_vec();
                if shape.len() != 4 || shape[1] != MASK_COEFFS {
                    return Err(anyhow!("unexpected prototype shape {:?}", shape));
                }
                Some(((shape[3], shape[2]), view.iter().copied().collect::<Vec<f32>>()))
            }
            None => None,
        };

        let side = self.input_size as f32;
        let scale = (frame.width() as f32 / side, frame.height() as f32 / side);
        let candidates = decode(&output0, rows, anchors, protos.is_some(), threshold, scale);
        let kept = suppress(candidates, self.iou_threshold);

        let frame_size = (frame.width(), frame.height());
        Ok(kept
            .into_iter()
            .map(|cand| match &protos {
                Some((dims, data)) => {
                    let mask = proto_mask(&cand, data, *dims, frame_size);
                    Detection::Masked {
                        class_id: cand.class_id,
                        confidence: cand.confidence,
                        bbox: cand.bbox,
                        mask,
                    }
                }
                None => Detection::Boxed {
                    class_id: cand.class_id,
                    confidence: cand.confidence,
                    bbox: cand.bbox,
                },
            })
            .collect())
    }
}
