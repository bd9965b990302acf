//! Relevance reranking service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CollectionError, Result};
use crate::types::config::JinaConfig;

/// A document scored against one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredText {
    pub text: String,
    pub score: f64,
}

/// Scores documents against a query, most relevant first.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rank `documents` for `query`, returning at most `top_n` of them.
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<ScoredText>>;
}

/// Jina AI rerank API client.
pub struct JinaReranker {
    client: Client,
    config: JinaConfig,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    top_n: usize,
    documents: &'a [String],
    return_documents: bool,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankItem>,
}

#[derive(Deserialize)]
struct RerankItem {
    document: RerankDocument,
    relevance_score: f64,
}

#[derive(Deserialize)]
struct RerankDocument {
    text: String,
}

impl JinaReranker {
    pub fn new(config: JinaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Create from `JINA_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(JinaConfig::from_env()?))
    }
}

#[async_trait]
impl Reranker for JinaReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<ScoredText>> {
        let request = RerankRequest {
            model: &self.config.model,
            query,
            top_n,
            documents,
            return_documents: true,
        };

        debug!(query, documents = documents.len(), "Reranking documents");

        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", self.config.api_key.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| CollectionError::Rerank(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CollectionError::Rerank(
                format!("Jina rerank error: {} - {}", status, text).into(),
            ));
        }

        let body: RerankResponse = response
            .json()
            .await
            .map_err(|e| CollectionError::Rerank(Box::new(e)))?;

        Ok(body
            .results
            .into_iter()
            .map(|item| ScoredText {
                text: item.document.text,
                score: item.relevance_score,
            })
            .collect())
    }
}
