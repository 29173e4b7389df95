//! Image search provider abstraction

pub mod duckduckgo;

use crate::error::DatasetError;
use async_trait::async_trait;
use thiserror::Error;

pub use duckduckgo::DuckDuckGoClient;

/// Search failures, split by whether backing off can help
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The provider is throttling requests
    #[error("rate limited by search provider (HTTP {status})")]
    RateLimited { status: u16 },
    /// Network failure, malformed response, or provider-side error
    #[error("search provider error: {0}")]
    Provider(String),
}

impl SearchError {
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<SearchError> for DatasetError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::RateLimited { status } => DatasetError::RateLimited { status },
            SearchError::Provider(msg) => DatasetError::Provider(msg),
        }
    }
}

/// An external image search service
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Return up to `limit` image locators for `query`.
    ///
    /// Fewer results than `limit` is not an error.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_conversion() {
        let error: DatasetError = SearchError::RateLimited { status: 403 }.into();
        assert!(matches!(error, DatasetError::RateLimited { status: 403 }));

        let error: DatasetError = SearchError::provider("bad json").into();
        assert!(matches!(error, DatasetError::Provider(ref msg) if msg == "bad json"));
    }

    #[test]
    fn test_is_rate_limited() {
        assert!(SearchError::RateLimited { status: 429 }.is_rate_limited());
        assert!(!SearchError::provider("timeout").is_rate_limited());
    }
}
