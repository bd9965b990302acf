//! Search query augmentation and SERP page requests.

use tracing::debug;

use crate::dates::{format_date, DateChunk};

/// Results requested per SERP page.
pub const RESULTS_PER_PAGE: usize = 20;

/// Most `site:` filters appended to one query.
pub const MAX_SITE_FILTERS: usize = 50;

const SEARCH_ENGINE_URL: &str = "https://www.google.com/search";

/// Append `after:` / `before:` operators for the chunk bounds that are set.
pub fn apply_date_filters(query: &str, chunk: &DateChunk) -> String {
    let mut filters = Vec::with_capacity(2);
    if let Some(start) = chunk.start {
        filters.push(format!("after:{}", format_date(start)));
    }
    if let Some(end) = chunk.end {
        filters.push(format!("before:{}", format_date(end)));
    }
    if filters.is_empty() {
        return query.to_string();
    }
    debug!(?filters, "Added date filters");
    format!("{} {}", query, filters.join(" "))
}

/// Append OR-combined `site:` operators for up to [`MAX_SITE_FILTERS`] sources.
pub fn apply_site_filters(query: &str, sources: &[String]) -> String {
    let filters: Vec<String> = sources
        .iter()
        .take(MAX_SITE_FILTERS)
        .map(|site| format!("site:{site}"))
        .collect();
    if filters.is_empty() {
        return query.to_string();
    }
    debug!(count = filters.len(), "Added site filters");
    format!("{} {}", query, filters.join(" OR "))
}

/// Full query text for one (query, chunk) unit.
pub fn build_query(query: &str, chunk: &DateChunk, sources: Option<&[String]>) -> String {
    let dated = apply_date_filters(query, chunk);
    match sources {
        Some(sources) => apply_site_filters(&dated, sources),
        None => dated,
    }
}

/// One SERP page to fetch through the search proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPageRequest {
    /// Query text, already augmented with date and site filters.
    pub query: String,

    /// Zero-based page number.
    pub page: usize,

    /// Read `news` results (`tbm=nws`) instead of `organic`.
    pub news_only: bool,

    /// Google `gl` geolocation code.
    pub country_code: Option<String>,
}

impl SearchPageRequest {
    pub fn new(query: impl Into<String>, page: usize) -> Self {
        Self {
            query: query.into(),
            page,
            news_only: false,
            country_code: None,
        }
    }

    pub fn with_news_only(mut self, news_only: bool) -> Self {
        self.news_only = news_only;
        self
    }

    pub fn with_country_code(mut self, code: Option<String>) -> Self {
        self.country_code = code;
        self
    }

    /// Result offset of this page.
    pub fn start(&self) -> usize {
        self.page * RESULTS_PER_PAGE
    }

    /// Search engine URL the proxy should fetch.
    pub fn search_url(&self) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(self.query.as_bytes()).collect();
        let mut url = format!(
            "{}?q={}&start={}&brd_json=1&num={}",
            SEARCH_ENGINE_URL,
            encoded,
            self.start(),
            RESULTS_PER_PAGE
        );
        if self.news_only {
            url.push_str("&tbm=nws");
        }
        if let Some(code) = &self.country_code {
            url.push_str("&gl=");
            url.push_str(code);
        }
        url
    }
}
