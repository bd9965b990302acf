//! Search proxy trait for fetching SERP pages.
//!
//! The retrieval orchestrator only needs "one query, one page, normalized
//! results". Which service fetches the search engine page is behind this
//! trait so tests can swap in `MockSearchProxy`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SearchError, SearchOutcome};
use crate::retrieval::request::SearchPageRequest;
use crate::types::config::BrightDataConfig;
use crate::types::search::SearchResult;

/// Fetches one page of search engine results.
#[async_trait]
pub trait SearchProxy: Send + Sync {
    /// Fetch the page described by `request`.
    ///
    /// Results come back in engine order. News requests should populate
    /// `source`; organic requests leave it empty.
    async fn search_page(&self, request: &SearchPageRequest) -> SearchOutcome<Vec<SearchResult>>;
}

/// Bright Data SERP proxy.
///
/// POSTs the search engine URL to the Bright Data request API and reads the
/// parsed JSON (`brd_json=1`) back.
pub struct BrightDataProxy {
    client: Client,
    config: BrightDataConfig,
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    zone: &'a str,
    url: &'a str,
    format: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic: Vec<SerpItem>,
    #[serde(default)]
    news: Vec<SerpItem>,
}

#[derive(Debug, Deserialize)]
struct SerpItem {
    link: Option<String>,
    title: Option<String>,
    description: Option<String>,
    source: Option<String>,
}

impl BrightDataProxy {
    pub fn new(config: BrightDataConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

/// Normalize a decoded SERP body into results.
///
/// Items without a link are skipped. Missing text fields become empty
/// strings, and news results always carry a `source`.
fn normalize_response(response: SerpResponse, news_only: bool) -> Vec<SearchResult> {
    let items = if news_only {
        response.news
    } else {
        response.organic
    };

    items
        .into_iter()
        .filter_map(|item| {
            let link = item.link?;
            let mut result = SearchResult::new(link)
                .with_title(item.title.unwrap_or_default())
                .with_description(item.description.unwrap_or_default());
            if news_only {
                result.source = Some(item.source.unwrap_or_default());
            }
            Some(result)
        })
        .collect()
}

#[async_trait]
impl SearchProxy for BrightDataProxy {
    async fn search_page(&self, request: &SearchPageRequest) -> SearchOutcome<Vec<SearchResult>> {
        let search_url = request.search_url();
        debug!(url = %search_url, page = request.page, "Requesting SERP page");

        let body = ProxyRequest {
            zone: &self.config.zone,
            url: &search_url,
            format: "raw",
        };

        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", self.config.api_key.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let text = response
            .text()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;
        let parsed: SerpResponse = serde_json::from_str(&text)
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

        let results = normalize_response(parsed, request.news_only);
        debug!(count = results.len(), "SERP page normalized");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> SerpResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_organic_results_drop_source() {
        let body = r#"{
            "organic": [
                {"link": "https://a.com", "title": "A", "description": "first", "source": "X"},
                {"title": "no link"},
                {"link": "https://b.com"}
            ],
            "news": [{"link": "https://n.com"}]
        }"#;
        let results = normalize_response(parse(body), false);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].link, "https://a.com");
        assert_eq!(results[0].source, None);
        assert_eq!(results[1].title, "");
        assert_eq!(results[1].description, "");
    }

    #[test]
    fn test_news_results_keep_source() {
        let body = r#"{"news": [{"link": "https://n.com", "title": "N", "source": "Reuters"}]}"#;
        let results = normalize_response(parse(body), true);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source.as_deref(), Some("Reuters"));
    }

    #[test]
    fn test_news_source_defaults_to_empty() {
        let body = r#"{"news": [{"link": "https://n.com"}]}"#;
        let results = normalize_response(parse(body), true);
        assert_eq!(results[0].source.as_deref(), Some(""));
    }

    #[test]
    fn test_missing_arrays_are_empty() {
        assert!(normalize_response(parse("{}"), false).is_empty());
        assert!(normalize_response(parse("{}"), true).is_empty());
    }

    #[test]
    fn test_proxy_request_body() {
        let body = ProxyRequest {
            zone: "serp_zone",
            url: "https://www.google.com/search?q=x",
            format: "raw",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["zone"], "serp_zone");
        assert_eq!(json["format"], "raw");
    }
}
