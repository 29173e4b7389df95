//! DuckDuckGo image search client
//!
//! Searching is a two step exchange: the HTML landing page yields a `vqd`
//! token, which is then passed to the `i.js` JSON endpoint. Results are paged
//! through the `next` link until enough locators are collected.

use super::{SearchClient, SearchError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://duckduckgo.com/";

/// Guard against a provider that keeps returning `next` without new results
const MAX_PAGES: usize = 20;

#[derive(Debug, Deserialize)]
struct ImagePage {
    #[serde(default)]
    results: Vec<ImageHit>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageHit {
    #[serde(default)]
    image: Option<String>,
}

/// Image search against DuckDuckGo
#[derive(Debug, Clone)]
pub struct DuckDuckGoClient {
    client: Client,
    base_url: Url,
}

impl DuckDuckGoClient {
    /// Create a client for the public endpoint
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(user_agent: &str) -> crate::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, user_agent)
    }

    /// Create a client against another base URL (a mirror or a test server)
    pub fn with_base_url(base_url: &str, user_agent: &str) -> crate::Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            crate::DatasetError::invalid_config(format!("Invalid search base URL '{base_url}': {e}"))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        // Redirects are a throttling signal, so they must not be followed
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(20))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, base_url })
    }

    async fn fetch_token(&self, query: &str) -> Result<String, SearchError> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::provider(format!("token request failed: {e}")))?;
        check_status(response.status())?;

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::provider(format!("token response unreadable: {e}")))?;
        extract_vqd(&html).ok_or_else(|| SearchError::provider("vqd token not found in response"))
    }

    async fn fetch_page(
        &self,
        query: &str,
        vqd: &str,
        offset: &str,
    ) -> Result<ImagePage, SearchError> {
        let endpoint = self
            .base_url
            .join("i.js")
            .map_err(|e| SearchError::provider(format!("invalid endpoint: {e}")))?;

        let response = self
            .client
            .get(endpoint)
            .header(reqwest::header::REFERER, self.base_url.as_str())
            .query(&[
                ("l", "wt-wt"),
                ("o", "json"),
                ("q", query),
                ("vqd", vqd),
                ("f", ",,,,,"),
                ("p", "1"),
                ("s", offset),
            ])
            .send()
            .await
            .map_err(|e| SearchError::provider(format!("image request failed: {e}")))?;
        check_status(response.status())?;

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::provider(format!("image response unreadable: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| SearchError::provider(format!("malformed image response: {e}")))
    }

    /// Offset (`s` parameter) of the page a `next` link points at
    fn next_offset(&self, next: &str) -> Option<String> {
        let url = self.base_url.join(next).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "s")
            .map(|(_, value)| value.into_owned())
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoClient {
    #[instrument(skip(self), level = "debug")]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        if limit == 0 {
            return Err(SearchError::provider("search limit must be greater than zero"));
        }

        let vqd = self.fetch_token(query).await?;
        let mut locators = Vec::new();
        let mut offset = "0".to_string();

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(query, &vqd, &offset).await?;
            let hits = page.results.len();
            locators.extend(
                page.results
                    .into_iter()
                    .filter_map(|hit| hit.image)
                    .filter(|image| !image.is_empty()),
            );
            debug!(hits, collected = locators.len(), "Fetched result page");

            if locators.len() >= limit || hits == 0 {
                break;
            }
            match page.next.as_deref().and_then(|next| self.next_offset(next)) {
                Some(next_offset) if next_offset != offset => offset = next_offset,
                _ => break,
            }
        }

        locators.truncate(limit);
        Ok(locators)
    }

    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}

/// Map throttling statuses to `RateLimited` and other failures to `Provider`
fn check_status(status: StatusCode) -> Result<(), SearchError> {
    match status.as_u16() {
        202 | 301 | 403 | 429 => Err(SearchError::RateLimited {
            status: status.as_u16(),
        }),
        _ if status.is_success() => Ok(()),
        _ => Err(SearchError::provider(format!("unexpected HTTP status {status}"))),
    }
}

/// Pull the `vqd` token out of the landing page HTML
fn extract_vqd(html: &str) -> Option<String> {
    for (open, close) in [("vqd=\"", '"'), ("vqd='", '\''), ("vqd=", '&')] {
        if let Some(start) = html.find(open) {
            let rest = html.get(start + open.len()..)?;
            if let Some(end) = rest.find(close) {
                let token = rest.get(..end)?;
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}
