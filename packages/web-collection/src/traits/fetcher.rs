//! Page fetcher trait: URL in, page markdown out.
//!
//! Rendering, JavaScript execution and HTML-to-markdown conversion are the
//! fetcher's business. The extraction pipeline only sees the markdown.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{BoxError, CollectionError, Result};
use crate::types::config::FirecrawlConfig;

/// Fetches a page and returns its content as markdown.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_markdown(&self, url: &str) -> Result<String>;
}

/// Firecrawl-backed fetcher using the `/scrape` endpoint.
pub struct FirecrawlFetcher {
    client: Client,
    config: FirecrawlConfig,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'a str; 1],
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
}

impl FirecrawlFetcher {
    pub fn new(config: FirecrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollectionError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Create from `FIRECRAWL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(FirecrawlConfig::from_env()?)
    }

    fn fetch_error(url: &str, source: impl Into<BoxError>) -> CollectionError {
        CollectionError::Fetch {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl PageFetcher for FirecrawlFetcher {
    async fn fetch_markdown(&self, url: &str) -> Result<String> {
        let endpoint = format!("{}/scrape", self.config.base_url.trim_end_matches('/'));
        let request = ScrapeRequest {
            url,
            formats: ["markdown"],
            only_main_content: false,
        };

        debug!(url, "Scraping page");

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", self.config.api_key.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::fetch_error(url, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::fetch_error(
                url,
                format!("Firecrawl API error: {} - {}", status, text),
            ));
        }

        let body: ScrapeResponse = response.json().await.map_err(|e| Self::fetch_error(url, e))?;
        if !body.success {
            let reason = body.error.unwrap_or_else(|| "scrape unsuccessful".to_string());
            return Err(Self::fetch_error(url, reason));
        }

        let markdown = body.data.and_then(|d| d.markdown).unwrap_or_default();
        debug!(url, chars = markdown.len(), "Page scraped");
        Ok(markdown)
    }
}
