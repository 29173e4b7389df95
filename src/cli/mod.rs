//! Command-line frontend
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod progress;

pub use main_impl::{main, Cli, Command, DownloadArgs, FlattenArgs, StatsArgs};
#[cfg(feature = "onnx")]
pub use main_impl::{AnnotateArgs, PredictArgs};
pub use progress::CliProgressReporter;
