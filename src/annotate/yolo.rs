//! YOLOv8 detector on ONNX Runtime

use super::{Detection, Detector, NormalizedBox};
use crate::error::{DatasetError, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array4, ArrayView3, Ix3};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use tracing::debug;

/// Square input resolution of the exported model
const INPUT_SIZE: u32 = 640;

/// IoU above which overlapping boxes of one class are suppressed
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// COCO class names in model output order
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Candidate box in input-pixel corner coordinates
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class: usize,
    score: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = w * h;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Detector backed by a YOLOv8 ONNX export
pub struct YoloDetector {
    session: Session,
    class_names: Vec<String>,
}

impl YoloDetector {
    /// Load a model file using the COCO class names
    ///
    /// # Errors
    /// - Model file missing or not a valid ONNX graph
    pub fn from_file<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(DatasetError::detector(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| DatasetError::detector(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DatasetError::detector(format!("Failed to set optimization level: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                DatasetError::detector(format!(
                    "Failed to load model '{}': {e}",
                    model_path.display()
                ))
            })?;

        debug!(model = %model_path.display(), "ONNX Runtime session created");
        Ok(Self {
            session,
            class_names: COCO_CLASSES.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Replace the class names (for models not trained on COCO)
    #[must_use]
    pub fn with_class_names(mut self, names: Vec<String>) -> Self {
        self.class_names = names;
        self
    }

    fn preprocess(image: &DynamicImage) -> Array4<f32> {
        let resized = image
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();
        let size = INPUT_SIZE as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for (channel, value) in pixel.0.iter().enumerate() {
                if let Some(slot) = input.get_mut((0, channel, y as usize, x as usize)) {
                    *slot = f32::from(*value) / 255.0;
                }
            }
        }
        input
    }

    /// Decode a `[1, 4 + classes, anchors]` (or transposed) output
    fn decode(output: &ArrayView3<'_, f32>, confidence: f32) -> Vec<Candidate> {
        let (_, d1, d2) = output.dim();
        let transposed = d1 > d2;
        let (features, anchors) = if transposed { (d2, d1) } else { (d1, d2) };
        let value = |feature: usize, anchor: usize| -> f32 {
            let index = if transposed {
                (0, anchor, feature)
            } else {
                (0, feature, anchor)
            };
            output.get(index).copied().unwrap_or(0.0)
        };

        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let mut best = (0usize, f32::MIN);
            for class in 0..features.saturating_sub(4) {
                let score = value(4 + class, anchor);
                if score > best.1 {
                    best = (class, score);
                }
            }
            if best.1 < confidence {
                continue;
            }
            let (cx, cy, w, h) = (
                value(0, anchor),
                value(1, anchor),
                value(2, anchor),
                value(3, anchor),
            );
            candidates.push(Candidate {
                class: best.0,
                score: best.1,
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
            });
        }
        candidates
    }
}

/// Greedy per-class non-maximum suppression
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class == candidate.class && k.iou(&candidate) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

impl Detector for YoloDetector {
    fn detect(&mut self, image: &DynamicImage, confidence: f32) -> Result<Vec<Detection>> {
        let input = Self::preprocess(image);
        let input_value = Value::from_array(input).map_err(|e| {
            DatasetError::detector(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| DatasetError::detector(format!("ONNX inference failed: {e}")))?;

        let candidates = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| DatasetError::detector("No output tensors found"))?;
            let output = outputs
                .get(first_key)
                .ok_or_else(|| DatasetError::detector("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| DatasetError::detector(format!("Failed to extract output tensor: {e}")))?;
            let output = output.into_dimensionality::<Ix3>().map_err(|e| {
                DatasetError::detector(format!("Unexpected output tensor shape: {e}"))
            })?;
            Self::decode(&output, confidence)
        };

        let size = INPUT_SIZE as f32;
        let detections: Vec<Detection> = non_max_suppression(candidates, NMS_IOU_THRESHOLD)
            .into_iter()
            .map(|c| Detection {
                class_name: self
                    .class_names
                    .get(c.class)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", c.class)),
                confidence: c.score,
                bbox: NormalizedBox::from_corners(c.x1, c.y1, c.x2, c.y2, size, size),
            })
            .collect();

        debug!(detections = detections.len(), "Inference finished");
        Ok(detections)
    }
}
