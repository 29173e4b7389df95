//! Detector-driven auto-annotation
//!
//! Runs a pre-trained detector over `images/<split>/<class_dir>/` and writes
//! YOLO label files to `labels/<split>/<class_dir>/`, relabelling every box of
//! the target detector class with the id of the directory's class.

#[cfg(feature = "onnx")]
pub mod yolo;

use crate::config::AnnotationConfig;
use crate::error::{DatasetError, Result};
use crate::layout::{DatasetLayout, Split, Subject};
use crate::services::ImageIOService;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};

#[cfg(feature = "onnx")]
pub use yolo::YoloDetector;

/// Extensions picked up for annotation
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Box in normalized center/size coordinates, all in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedBox {
    /// Build from pixel-space corners, clamped to the image
    #[must_use]
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32, width: f32, height: f32) -> Self {
        let x1 = x1.clamp(0.0, width);
        let x2 = x2.clamp(0.0, width);
        let y1 = y1.clamp(0.0, height);
        let y2 = y2.clamp(0.0, height);
        Self {
            x_center: (x1 + x2) / 2.0 / width,
            y_center: (y1 + y2) / 2.0 / height,
            width: (x2 - x1).abs() / width,
            height: (y2 - y1).abs() / height,
        }
    }
}

/// A single detector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: NormalizedBox,
}

/// A pre-trained object detector
pub trait Detector {
    /// Detect objects with at least `confidence` score
    ///
    /// # Errors
    /// - Inference failures
    fn detect(&mut self, image: &DynamicImage, confidence: f32) -> Result<Vec<Detection>>;
}

/// Format one YOLO label line: `<class_id> <x> <y> <w> <h>` with six decimals
#[must_use]
pub fn label_line(class_id: usize, bbox: &NormalizedBox) -> String {
    format!(
        "{} {:.6} {:.6} {:.6} {:.6}\n",
        class_id, bbox.x_center, bbox.y_center, bbox.width, bbox.height
    )
}

/// Ordered class directory names; a class id is its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMap {
    names: Vec<String>,
}

impl ClassMap {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Class map over the subjects' directory names, in subject order
    #[must_use]
    pub fn from_subjects(subjects: &[Subject]) -> Self {
        Self::new(subjects.iter().map(Subject::dir_name).collect())
    }

    #[must_use]
    pub fn id_of(&self, class_dir: &str) -> Option<usize> {
        self.names.iter().position(|name| name == class_dir)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Counts from an annotation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationSummary {
    pub images: usize,
    pub label_files: usize,
    pub boxes: usize,
    pub skipped_images: usize,
    pub skipped_dirs: usize,
}

/// Writes YOLO labels for a dataset using a detector
pub struct Annotator<D: Detector> {
    detector: D,
    classes: ClassMap,
    config: AnnotationConfig,
}

impl<D: Detector> Annotator<D> {
    /// # Errors
    /// - Invalid annotation configuration
    pub fn new(detector: D, classes: ClassMap, config: AnnotationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector,
            classes,
            config,
        })
    }

    /// Annotate every class directory of both splits
    pub fn annotate_dataset(&mut self, layout: &DatasetLayout) -> Result<AnnotationSummary> {
        let mut summary = AnnotationSummary::default();

        for split in Split::ALL {
            let split_dir = layout.images_dir().join(split.as_str());
            if !split_dir.is_dir() {
                debug!(dir = %split_dir.display(), "Split directory missing, skipping");
                continue;
            }

            let mut class_dirs = Vec::new();
            for entry in std::fs::read_dir(&split_dir)
                .map_err(|e| DatasetError::file_io_error("list split directory", &split_dir, &e))?
            {
                let entry = entry
                    .map_err(|e| DatasetError::file_io_error("list split directory", &split_dir, &e))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || !entry.path().is_dir() {
                    continue;
                }
                class_dirs.push(name);
            }
            class_dirs.sort();

            for class_dir in class_dirs {
                let Some(class_id) = self.classes.id_of(&class_dir) else {
                    warn!(class_dir = %class_dir, split = %split, "Class directory not in class map, skipping");
                    summary.skipped_dirs += 1;
                    continue;
                };
                let image_dir = split_dir.join(&class_dir);
                let label_dir = layout.labels_dir().join(split.as_str()).join(&class_dir);
                self.annotate_directory(&image_dir, &label_dir, class_id, &mut summary)?;
            }
        }

        info!(
            images = summary.images,
            label_files = summary.label_files,
            boxes = summary.boxes,
            "Annotation finished"
        );
        Ok(summary)
    }

    /// Annotate the images of one class directory
    pub fn annotate_directory(
        &mut self,
        image_dir: &Path,
        label_dir: &Path,
        class_id: usize,
        summary: &mut AnnotationSummary,
    ) -> Result<()> {
        std::fs::create_dir_all(label_dir)
            .map_err(|e| DatasetError::file_io_error("create label directory", label_dir, &e))?;

        let mut images: Vec<_> = std::fs::read_dir(image_dir)
            .map_err(|e| DatasetError::file_io_error("list image directory", image_dir, &e))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        images.sort();

        info!("📂 Processing {} images in {}", images.len(), image_dir.display());

        for image_path in images {
            let image = match ImageIOService::load_image(&image_path) {
                Ok(image) => image,
                Err(e) => {
                    warn!(path = %image_path.display(), error = %e, "Unreadable image, skipping");
                    summary.skipped_images += 1;
                    continue;
                },
            };
            summary.images += 1;

            let detections = self
                .detector
                .detect(&image, self.config.confidence_threshold)?;

            let mut contents = String::new();
            for detection in detections
                .iter()
                .filter(|d| d.class_name == self.config.target_label)
            {
                contents.push_str(&label_line(class_id, &detection.bbox));
                summary.boxes += 1;
            }

            let stem = image_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let label_path = label_dir.join(format!("{stem}.txt"));
            std::fs::write(&label_path, contents)
                .map_err(|e| DatasetError::file_io_error("write label file", &label_path, &e))?;
            summary.label_files += 1;
            debug!("✅ Annotated {}", image_path.display());
        }
        Ok(())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Render detections as a human-readable line each
#[must_use]
pub fn describe_detections(detections: &[Detection]) -> String {
    let mut out = String::new();
    for d in detections {
        let _ = writeln!(
            out,
            "{} {:.1}% center=({:.3}, {:.3}) size=({:.3}, {:.3})",
            d.class_name,
            d.confidence * 100.0,
            d.bbox.x_center,
            d.bbox.y_center,
            d.bbox.width,
            d.bbox.height
        );
    }
    out
}
