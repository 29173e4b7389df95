//! Rate-limit aware retry with exponential backoff

use crate::config::{ProviderErrorPolicy, RetryPolicy};
use crate::error::Result;
use crate::search::{SearchClient, SearchError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Suspends the pipeline between attempts and between queries
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Wraps a search client with the configured retry policy
pub struct RetryController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Search, retrying throttled attempts.
    ///
    /// Makes at most `1 + max_retries` calls. Before each retry it sleeps for
    /// the current wait and then doubles it. When retries run out the failure
    /// is logged and an empty list returned. Non-throttling errors follow
    /// [`ProviderErrorPolicy`]; only `Abort` makes this return `Err`.
    pub async fn search_with_retry(
        &self,
        client: &dyn SearchClient,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut wait = self.policy.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            let error = match client.search(query, limit).await {
                Ok(locators) => return Ok(locators),
                Err(error) => error,
            };

            if let SearchError::Provider(_) = &error {
                match self.policy.provider_errors {
                    ProviderErrorPolicy::Retry => {},
                    ProviderErrorPolicy::Skip => {
                        warn!(query = %query, error = %error, "Search failed, skipping query");
                        return Ok(Vec::new());
                    },
                    ProviderErrorPolicy::Abort => return Err(error.into()),
                }
            }

            if attempt >= self.policy.max_retries {
                warn!(
                    query = %query,
                    attempts = attempt + 1,
                    error = %error,
                    "Giving up on query after exhausting retries"
                );
                return Ok(Vec::new());
            }

            attempt += 1;
            info!(
                query = %query,
                attempt,
                max_retries = self.policy.max_retries,
                wait_secs = wait.as_secs_f64(),
                error = %error,
                "Backing off before retry"
            );
            self.sleeper.sleep(wait).await;
            wait = wait.saturating_mul(2);
        }
    }
}
