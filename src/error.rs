//! Error types for dataset acquisition and curation

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dataset operations
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Error types for dataset operations
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration file parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction or transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Search provider failure other than throttling
    #[error("Search provider error: {0}")]
    Provider(String),

    /// Search provider throttled the request
    #[error("Search provider rate limited the request (HTTP {status})")]
    RateLimited { status: u16 },

    /// Detector loading or inference errors
    #[error("Detector error: {0}")]
    Detector(String),

    /// No file index left for a dataset directory
    #[error("No free image index left in '{}'", dir.display())]
    IndexExhausted { dir: PathBuf },

    /// Malformed label file line
    #[error("Failed to parse label '{}' line {line}: {message}", path.display())]
    LabelParse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl DatasetError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new provider error
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a new detector error
    pub fn detector<S: Into<String>>(msg: S) -> Self {
        Self::Detector(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }
}
