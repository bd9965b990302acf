//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the collection library
//! without making real search, LLM or network calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::error::{CollectionError, Result, SearchError, SearchOutcome};
use crate::retrieval::request::SearchPageRequest;
use crate::traits::{
    completion::Completion,
    fetcher::PageFetcher,
    ocr::PdfTextExtractor,
    reranker::{Reranker, ScoredText},
    searcher::SearchProxy,
};
use crate::types::search::SearchResult;

/// A mock search proxy keyed by (augmented query, result offset).
///
/// Unknown pages return no results. Every request is recorded before any
/// configured failure is returned.
#[derive(Default, Clone)]
pub struct MockSearchProxy {
    pages: Arc<RwLock<HashMap<(String, usize), Vec<SearchResult>>>>,
    failures: Arc<RwLock<HashSet<(String, usize)>>>,
    requests: Arc<RwLock<Vec<SearchPageRequest>>>,
}

impl MockSearchProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results for the page of `query` starting at `start`.
    pub fn with_results(self, query: impl Into<String>, start: usize, results: Vec<SearchResult>) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert((query.into(), start), results);
        self
    }

    /// Fail the page of `query` starting at `start`.
    pub fn fail_on(self, query: impl Into<String>, start: usize) -> Self {
        self.failures.write().unwrap().insert((query.into(), start));
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<SearchPageRequest> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl SearchProxy for MockSearchProxy {
    async fn search_page(&self, request: &SearchPageRequest) -> SearchOutcome<Vec<SearchResult>> {
        self.requests.write().unwrap().push(request.clone());

        let key = (request.query.clone(), request.start());
        if self.failures.read().unwrap().contains(&key) {
            return Err(SearchError::Status {
                status: 502,
                body: "mock proxy failure".to_string(),
            });
        }

        Ok(self.pages.read().unwrap().get(&key).cloned().unwrap_or_default())
    }
}

/// A mock completion model.
///
/// Responses are matched by prompt substring in the order they were added;
/// the default answers everything else.
#[derive(Default, Clone)]
pub struct MockCompletion {
    responses: Arc<RwLock<Vec<(String, String)>>>,
    default: Arc<RwLock<Option<String>>>,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer prompts containing `needle` with `response`.
    pub fn with_response(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses
            .write()
            .unwrap()
            .push((needle.into(), response.into()));
        self
    }

    /// Answer unmatched prompts with `response`.
    pub fn with_default(self, response: impl Into<String>) -> Self {
        *self.default.write().unwrap() = Some(response.into());
        self
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().unwrap().clone()
    }
}

#[async_trait]
impl Completion for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.write().unwrap().push(prompt.to_string());

        let matched = self
            .responses
            .read()
            .unwrap()
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone());

        matched
            .or_else(|| self.default.read().unwrap().clone())
            .ok_or_else(|| CollectionError::Llm("no mock response for prompt".into()))
    }
}

/// A mock page fetcher returning canned markdown by URL.
///
/// Unknown URLs return an empty page.
#[derive(Default, Clone)]
pub struct MockPageFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    fetched: Arc<RwLock<Vec<String>>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, markdown: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), markdown.into());
        self
    }

    pub fn fail_on(self, url: impl Into<String>) -> Self {
        self.failures.write().unwrap().insert(url.into());
        self
    }

    /// URLs fetched so far, in order, including failed ones.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_markdown(&self, url: &str) -> Result<String> {
        self.fetched.write().unwrap().push(url.to_string());

        if self.failures.read().unwrap().contains(url) {
            return Err(CollectionError::Fetch {
                url: url.to_string(),
                source: "mock fetch failure".into(),
            });
        }

        Ok(self.pages.read().unwrap().get(url).cloned().unwrap_or_default())
    }
}

/// A mock OCR service returning canned text by URL.
#[derive(Default, Clone)]
pub struct MockOcr {
    texts: Arc<RwLock<HashMap<String, String>>>,
}

impl MockOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.write().unwrap().insert(url.into(), text.into());
        self
    }
}

#[async_trait]
impl PdfTextExtractor for MockOcr {
    async fn extract_text(&self, url: &str) -> Result<String> {
        self.texts
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| CollectionError::Ocr {
                url: url.to_string(),
                source: "no mock text for URL".into(),
            })
    }
}

/// A mock reranker that ranks documents in reverse input order.
#[derive(Default, Clone)]
pub struct MockReranker {
    calls: Arc<RwLock<Vec<(String, Vec<String>, usize)>>>,
}

impl MockReranker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far as (query, documents, top_n).
    pub fn calls(&self) -> Vec<(String, Vec<String>, usize)> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<ScoredText>> {
        self.calls
            .write()
            .unwrap()
            .push((query.to_string(), documents.to_vec(), top_n));

        let count = documents.len();
        Ok(documents
            .iter()
            .rev()
            .take(top_n)
            .enumerate()
            .map(|(rank, text)| ScoredText {
                text: text.clone(),
                score: (count - rank) as f64 / count as f64,
            })
            .collect())
    }
}
