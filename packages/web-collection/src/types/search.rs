//! Search-side types: variable sets, combinations, and normalized results.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Variable name → ordered candidate values.
///
/// Insertion order is significant: it fixes the order of values inside every
/// [`VariableCombination`].
pub type VariableSet = IndexMap<String, Vec<String>>;

/// One concrete value per placeholder referenced by a template, in
/// variable-set order.
pub type VariableCombination = Vec<String>;

/// Batch retrieval output: combination → query → results.
///
/// Keys appear in the order they were first processed.
pub type RetrievalResults =
    IndexMap<Option<VariableCombination>, IndexMap<String, Vec<SearchResult>>>;

/// A normalized search engine result.
///
/// Identity is the `link`, compared as an exact string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub link: String,
    pub title: String,
    pub description: String,

    /// Publishing outlet; only present for news-mode results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SearchResult {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: String::new(),
            description: String::new(),
            source: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// One streamed retrieval item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedResult {
    /// Combination that produced the query (`None` for unexpanded templates).
    pub combination: Option<VariableCombination>,

    /// Query text as sent, including date and site filters.
    pub query: String,

    pub result: SearchResult,
}

/// Flatten batch results into `(combination, query, result)` rows.
pub fn flatten_results(results: &RetrievalResults) -> Vec<RetrievedResult> {
    results
        .iter()
        .flat_map(|(combination, by_query)| {
            by_query.iter().flat_map(move |(query, items)| {
                items.iter().map(move |result| RetrievedResult {
                    combination: combination.clone(),
                    query: query.clone(),
                    result: result.clone(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_omitted_outside_news_mode() {
        let organic = SearchResult::new("https://a.com").with_title("A");
        let json = serde_json::to_value(&organic).unwrap();
        assert!(json.get("source").is_none());

        let news = organic.with_source("Reuters");
        let json = serde_json::to_value(&news).unwrap();
        assert_eq!(json["source"], "Reuters");
    }

    #[test]
    fn test_flatten_results_keeps_order() {
        let mut results = RetrievalResults::new();
        results
            .entry(Some(vec!["A".into()]))
            .or_default()
            .insert("q A".into(), vec![SearchResult::new("1"), SearchResult::new("2")]);
        results
            .entry(None)
            .or_default()
            .insert("q".into(), vec![SearchResult::new("3")]);

        let rows = flatten_results(&results);
        let links: Vec<_> = rows.iter().map(|r| r.result.link.as_str()).collect();
        assert_eq!(links, vec!["1", "2", "3"]);
        assert_eq!(rows[2].combination, None);
    }
}
