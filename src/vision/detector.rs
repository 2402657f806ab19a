//! Component detection via ONNX Runtime
//!
//! Runs a pretrained YOLO-style model over captured frames and exposes the
//! detections through the narrow [`Detector`] trait so the inspection engine
//! never depends on the runtime directly.

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::capture::frame::CapturedFrame;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
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

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// One detected component instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Index into the detector's class table.
    pub class_id: usize,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Black-box object detector: boxes with class ids and a class name table.
pub trait Detector: Send {
    /// Run inference on a frame and return raw detections.
    fn infer(&mut self, frame: &CapturedFrame) -> Result<Vec<Detection>>;

    /// Class name for a class id, `"unknown"` if out of range.
    fn class_name(&self, class_id: usize) -> String;
}

/// Collapse multiple detections of the same class to the single
/// highest-confidence instance. Ties keep the first detection seen.
///
/// The validation engine counts at most one instance per component type per
/// frame; this stage guarantees that instead of leaving it incidental.
pub fn reduce_best_per_class(detections: Vec<Detection>) -> Vec<Detection> {
    let mut best: HashMap<usize, Detection> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();

    for detection in detections {
        match best.get(&detection.class_id) {
            Some(existing) if existing.confidence >= detection.confidence => {}
            _ => {
                if !best.contains_key(&detection.class_id) {
                    order.push(detection.class_id);
                }
                best.insert(detection.class_id, detection);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|class_id| best.remove(&class_id))
        .collect()
}

/// Display label for a detector class, correcting typos the trained model's
/// label set carries. Rule matching always uses the raw class name.
pub fn display_label(class_name: &str) -> String {
    match class_name {
        "No resitor" => "No resistor".to_string(),
        "Missalignment" => "Misalignment".to_string(),
        other => other.to_string(),
    }
}

/// YOLO detector backed by ONNX Runtime.
pub struct YoloDetector {
    session: Session,
    class_names: Vec<String>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    /// Load the model and its class-name table (a JSON array of strings).
    pub fn new(
        model_path: &Path,
        class_names_path: &Path,
        input_size: u32,
        confidence_threshold: f32,
    ) -> Result<Self> {
        info!("Loading detection model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(4)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(model_path)
            .context("Failed to load detection model")?;

        let names_content = std::fs::read_to_string(class_names_path)
            .with_context(|| format!("Failed to read class names from {:?}", class_names_path))?;
        let class_names: Vec<String> = serde_json::from_str(&names_content)
            .context("Class names file must be a JSON array of strings")?;

        info!(
            "Detection model loaded: {} classes, input {}x{}",
            class_names.len(),
            input_size,
            input_size
        );

        Ok(Self {
            session,
            class_names,
            input_size,
            confidence_threshold,
            iou_threshold: 0.45,
        })
    }

    /// Resize the frame to the model input and lay it out as NCHW float.
    fn preprocess(&self, frame: &CapturedFrame) -> Result<Vec<f32>> {
        let size = self.input_size;
        let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .context("Frame buffer does not match its dimensions")?;
        let resized = image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                input[[0, channel, y as usize, x as usize]] = pixel.0[channel] as f32 / 255.0;
            }
        }

        let (data, _offset) = input.into_raw_vec_and_offset();
        Ok(data)
    }

    /// Decode the `[1, 4 + classes, anchors]` output into thresholded,
    /// NMS-suppressed detections in frame coordinates.
    fn postprocess(
        &self,
        data: &[f32],
        num_attrs: usize,
        num_anchors: usize,
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<Detection> {
        let num_classes = num_attrs.saturating_sub(4).min(self.class_names.len());
        let scale_x = frame_width as f32 / self.input_size as f32;
        let scale_y = frame_height as f32 / self.input_size as f32;
        let at = |attr: usize, anchor: usize| data[attr * num_anchors + anchor];

        let mut candidates = Vec::new();
        for anchor in 0..num_anchors {
            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for class in 0..num_classes {
                let score = at(4 + class, anchor);
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }

            if best_score < self.confidence_threshold {
                continue;
            }

            let cx = at(0, anchor) * scale_x;
            let cy = at(1, anchor) * scale_y;
            let w = at(2, anchor) * scale_x;
            let h = at(3, anchor) * scale_y;

            candidates.push(Detection {
                class_id: best_class,
                confidence: best_score,
                bbox: BoundingBox::new(
                    (cx - w / 2.0).max(0.0),
                    (cy - h / 2.0).max(0.0),
                    (cx + w / 2.0).min(frame_width as f32),
                    (cy + h / 2.0).min(frame_height as f32),
                ),
            });
        }

        non_maximum_suppression(candidates, self.iou_threshold)
    }
}

impl Detector for YoloDetector {
    fn infer(&mut self, frame: &CapturedFrame) -> Result<Vec<Detection>> {
        let start = Instant::now();

        let input = self.preprocess(frame)?;
        let size = self.input_size as usize;
        let tensor = Tensor::from_array(([1usize, 3, size, size], input))?;

        let outputs = self.session.run(ort::inputs![tensor])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let data = data.to_vec();
        drop(outputs);
        let (num_attrs, num_anchors) = match dims.as_slice() {
            [_, attrs, anchors] => (*attrs, *anchors),
            other => anyhow::bail!("Unexpected detector output shape {:?}", other),
        };

        let detections =
            self.postprocess(&data, num_attrs, num_anchors, frame.width, frame.height);

        debug!(
            "Inference complete in {:?}: {} detections",
            start.elapsed(),
            detections.len()
        );

        Ok(detections)
    }

    fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Greedy per-class non-maximum suppression.
fn non_maximum_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|existing| {
            existing.class_id == candidate.class_id
                && existing.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
