#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Car Dataset
//!
//! Builds an object-detection dataset of car models from web image search.
//!
//! For every subject (a car model name) the pipeline generates descriptive
//! queries, collects candidate image locators from a search provider with
//! rate-limit aware retries, splits them into train and validation portions
//! and saves every decodable image as an RGB JPEG under a stable layout:
//!
//! ```text
//! <root>/images/train/<Subject_Dir>/<subject_prefix>_001.jpg
//! <root>/images/val/<Subject_Dir>/<subject_prefix>_001.jpg
//! ```
//!
//! Re-running appends to existing directories without overwriting.
//!
//! ## Features
//!
//! - **Acquisition**: query generation, `DuckDuckGo` image search, retry with backoff
//! - **Auto-annotation**: YOLO label files from a YOLOv8 ONNX detector (`onnx` feature)
//! - **Label tools**: flatten per-class label trees and count class balance
//! - **CLI Integration**: `car-dataset` binary (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use car_dataset::{AcquisitionConfig, AcquisitionOrchestrator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AcquisitionConfig::builder()
//!     .subjects(["Ferrari F40", "Porsche 918 Spyder"])
//!     .dataset_root("car_dataset")
//!     .build()?;
//!
//! let report = AcquisitionOrchestrator::new(config)?.run().await?;
//! println!("saved {} images", report.total_saved());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): YOLOv8 detector on ONNX Runtime for auto-annotation
//! - `cli` (default): command-line interface, progress bars and tracing setup
//! - `tracing-json`, `tracing-files`: extra log output formats for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! car-dataset = { version = "0.1", default-features = false }
//! ```

pub mod annotate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod labels;
pub mod layout;
pub mod orchestrator;
pub mod query;
pub mod retry;
pub mod search;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;

pub use annotate::{
    AnnotationSummary, Annotator, ClassMap, Detection, Detector, NormalizedBox,
};
#[cfg(feature = "onnx")]
pub use annotate::YoloDetector;
pub use config::{
    AcquisitionConfig, AcquisitionConfigBuilder, AnnotationConfig, DescriptorAxes,
    ProviderErrorPolicy, RetryPolicy, SplitStrategy,
};
pub use error::{DatasetError, Result};
pub use fetch::{FetchOutcome, HttpImageFetcher, ImageFetcher};
pub use labels::{class_distribution, flatten_labels, FlattenSummary};
pub use layout::{DatasetLayout, Split, SplitDirs, Subject};
pub use orchestrator::{
    AcquisitionOrchestrator, AcquisitionOrchestratorBuilder, AcquisitionReport, SubjectReport,
};
pub use query::QueryGenerator;
pub use retry::{RetryController, Sleeper, TokioSleeper};
pub use search::{DuckDuckGoClient, SearchClient, SearchError};
pub use services::{
    AcquisitionEvent, ImageIOService, NoOpProgressReporter, ProgressReporter,
    TracingProgressReporter,
};
