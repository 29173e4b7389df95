//! Candidate image fetching
//!
//! A fetch never raises: every failure is folded into a [`FetchOutcome`] so a
//! single bad locator cannot abort a batch.

use crate::error::Result;
use crate::services::ImageIOService;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Result of fetching one candidate locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The image was decoded and written to the destination
    Saved,
    /// Timeout, connection failure or non-2xx response
    NetworkFailed(String),
    /// The body was not a decodable image
    DecodeFailed(String),
    /// Encoding or writing the destination file failed
    WriteFailed(String),
}

impl FetchOutcome {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }

    /// Short label for summaries
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::NetworkFailed(_) => "network",
            Self::DecodeFailed(_) => "decode",
            Self::WriteFailed(_) => "write",
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved => write!(f, "saved"),
            Self::NetworkFailed(reason) => write!(f, "network failure: {reason}"),
            Self::DecodeFailed(reason) => write!(f, "not a decodable image: {reason}"),
            Self::WriteFailed(reason) => write!(f, "write failure: {reason}"),
        }
    }
}

/// Retrieves a locator and persists it as a dataset image
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_and_save(&self, locator: &str, destination: &Path) -> FetchOutcome;
}

/// Fetches over HTTP, normalizes to RGB and saves as JPEG
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: Client,
    timeout: Duration,
    jpeg_quality: u8,
}

impl HttpImageFetcher {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(user_agent: &str, timeout: Duration, jpeg_quality: u8) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            timeout,
            jpeg_quality,
        })
    }

    async fn download(&self, locator: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self
            .client
            .get(locator)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_and_save(&self, locator: &str, destination: &Path) -> FetchOutcome {
        let bytes = match self.download(locator).await {
            Ok(bytes) => bytes,
            Err(reason) => return FetchOutcome::NetworkFailed(reason),
        };
        debug!(locator = %locator, bytes = bytes.len(), "Downloaded candidate");

        let image = match ImageIOService::decode_rgb(&bytes) {
            Ok(image) => image,
            Err(e) => return FetchOutcome::DecodeFailed(e.to_string()),
        };

        match ImageIOService::write_jpeg_atomic(&image, destination, self.jpeg_quality) {
            Ok(()) => FetchOutcome::Saved,
            Err(e) => FetchOutcome::WriteFailed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_outcome_helpers() {
        assert!(FetchOutcome::Saved.is_saved());
        assert!(!FetchOutcome::NetworkFailed("timeout".into()).is_saved());
        assert_eq!(FetchOutcome::DecodeFailed("x".into()).kind(), "decode");
        assert_eq!(
            FetchOutcome::WriteFailed("disk full".into()).to_string(),
            "write failure: disk full"
        );
    }

    #[tokio::test]
    async fn test_unreachable_locator_is_network_failure() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("x_001.jpg");
        let fetcher = HttpImageFetcher::new("test", Duration::from_secs(2), 90).unwrap();

        let outcome = fetcher
            .fetch_and_save("http://127.0.0.1:9/unreachable.jpg", &destination)
            .await;

        assert!(matches!(outcome, FetchOutcome::NetworkFailed(_)));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_invalid_locator_is_network_failure() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("x_001.jpg");
        let fetcher = HttpImageFetcher::new("test", Duration::from_secs(2), 90).unwrap();

        let outcome = fetcher.fetch_and_save("not a url", &destination).await;

        assert!(matches!(outcome, FetchOutcome::NetworkFailed(_)));
        assert!(!destination.exists());
    }
}
