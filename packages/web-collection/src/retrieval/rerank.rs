//! Reranking retrieved text grouped by the query that found it.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{InputError, Result};
use crate::traits::reranker::Reranker;

/// A document ranked against the query that retrieved it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDocument {
    pub query: String,
    pub text: String,
    pub score: f64,
}

/// Rerank `documents`, each paired with the query at the same index.
///
/// Documents are grouped by query in first-appearance order, and each group
/// is ranked in one request that keeps every document. Output follows group
/// order, then the reranker's order within a group.
pub async fn rerank_results<R: Reranker + ?Sized>(
    reranker: &R,
    queries: &[String],
    documents: &[String],
) -> Result<Vec<RankedDocument>> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }
    if queries.len() != documents.len() {
        return Err(InputError::RerankLengthMismatch {
            queries: queries.len(),
            documents: documents.len(),
        }
        .into());
    }

    let mut groups: IndexMap<&str, Vec<String>> = IndexMap::new();
    for (query, document) in queries.iter().zip(documents) {
        groups.entry(query.as_str()).or_default().push(document.clone());
    }
    debug!(groups = groups.len(), documents = documents.len(), "Grouped documents for reranking");

    let mut ranked = Vec::with_capacity(documents.len());
    for (query, group) in &groups {
        let scored = reranker.rerank(query, group, group.len()).await?;
        ranked.extend(scored.into_iter().map(|s| RankedDocument {
            query: query.to_string(),
            text: s.text,
            score: s.score,
        }));
    }

    Ok(ranked)
}
