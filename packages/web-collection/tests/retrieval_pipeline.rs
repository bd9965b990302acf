//! Integration tests for retrieval and extraction over mock collaborators.
//!
//! These tests drive the public API end to end:
//! 1. Expand templates and split the date range
//! 2. Page through the search proxy with cross-query deduplication
//! 3. Extract and ground datapoints from the retrieved pages

use futures::StreamExt;
use std::error::Error as _;
use std::sync::Arc;

use web_collection::{
    testing::{MockCompletion, MockPageFetcher, MockSearchProxy},
    CollectionError, CountryCatalog, DataExtractor, ExtractOptions, ExtractionSchema,
    FieldDescriptor, FieldType, RetrievalRequest, Retriever, SearchError, SearchResult,
    VariableSet,
};

const FIRST_CHUNK: &str = "after:2022-01-01 before:2022-07-19";
const SECOND_CHUNK: &str = "after:2022-07-20 before:2023-02-04";

fn catalog() -> Arc<CountryCatalog> {
    Arc::new(CountryCatalog::from_json(r#"{"Chad": "td"}"#, r#"{"Chad": ["alwihdainfo.com"]}"#).unwrap())
}

fn countries() -> VariableSet {
    let mut variables = VariableSet::new();
    variables.insert("country".to_string(), vec!["Chad".to_string(), "Mali".to_string()]);
    variables
}

/// Two templates, one expanded over two countries, across 400 days.
fn cholera_request() -> RetrievalRequest {
    RetrievalRequest::new(["cholera outbreak", "cholera cases {country}"], 2)
        .with_variables(countries())
        .with_start_date("2022-01-01")
        .with_end_date("2023-02-04")
        .with_time_chunking(true)
}

fn dated(query: &str, chunk: &str) -> String {
    format!("{query} {chunk}")
}

fn proxy() -> MockSearchProxy {
    MockSearchProxy::new()
        .with_results(
            dated("cholera outbreak", FIRST_CHUNK),
            0,
            vec![
                SearchResult::new("https://a.com").with_title("Outbreak declared"),
                SearchResult::new("https://b.com"),
            ],
        )
        .with_results(
            dated("cholera cases Chad", FIRST_CHUNK),
            0,
            vec![SearchResult::new("https://b.com"), SearchResult::new("https://c.com")],
        )
        .with_results(
            dated("cholera cases Mali", SECOND_CHUNK),
            20,
            vec![SearchResult::new("https://a.com"), SearchResult::new("https://d.com")],
        )
}

#[tokio::test]
async fn test_every_unit_is_paged_in_order() {
    let retriever = Retriever::new(proxy(), catalog());
    retriever.retrieve(&cholera_request()).await.unwrap();

    let requests = retriever.proxy().requests();
    assert_eq!(requests.len(), 3 * 2 * 2);

    let first: Vec<_> = requests.iter().take(4).map(|r| (r.query.as_str(), r.start())).collect();
    assert_eq!(
        first,
        vec![
            ("cholera outbreak after:2022-01-01 before:2022-07-19", 0),
            ("cholera outbreak after:2022-01-01 before:2022-07-19", 20),
            ("cholera outbreak after:2022-07-20 before:2023-02-04", 0),
            ("cholera outbreak after:2022-07-20 before:2023-02-04", 20),
        ]
    );
    assert!(requests.iter().all(|r| r.country_code.is_none() && !r.news_only));
}

#[tokio::test]
async fn test_batch_attributes_duplicates_to_first_query() {
    let retriever = Retriever::new(proxy(), catalog());
    let results = retriever.retrieve(&cholera_request()).await.unwrap();

    let keys: Vec<_> = results.keys().cloned().collect();
    assert_eq!(
        keys,
        vec![None, Some(vec!["Chad".to_string()]), Some(vec!["Mali".to_string()])]
    );

    let links = |combination: Option<Vec<String>>, query: &str| -> Vec<String> {
        results[&combination][query].iter().map(|r| r.link.clone()).collect()
    };
    assert_eq!(links(None, "cholera outbreak"), vec!["https://a.com", "https://b.com"]);
    assert_eq!(links(Some(vec!["Chad".into()]), "cholera cases Chad"), vec!["https://c.com"]);
    assert_eq!(links(Some(vec!["Mali".into()]), "cholera cases Mali"), vec!["https://d.com"]);
    assert_eq!(results[&None]["cholera outbreak"][0].title, "Outbreak declared");
}

#[tokio::test]
async fn test_stream_matches_batch_order() {
    let retriever = Retriever::new(proxy(), catalog());
    let items: Vec<_> = retriever
        .retrieve_stream(&cholera_request())
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    let seen: Vec<_> = items
        .iter()
        .map(|i| (i.query.as_str(), i.result.link.as_str()))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("cholera outbreak after:2022-01-01 before:2022-07-19", "https://a.com"),
            ("cholera outbreak after:2022-01-01 before:2022-07-19", "https://b.com"),
            ("cholera cases Chad after:2022-01-01 before:2022-07-19", "https://c.com"),
            ("cholera cases Mali after:2022-07-20 before:2023-02-04", "https://d.com"),
        ]
    );
    assert_eq!(items[2].combination, Some(vec!["Chad".to_string()]));
}

#[tokio::test]
async fn test_site_and_country_restrictions_reach_the_proxy() {
    let retriever = Retriever::new(MockSearchProxy::new(), catalog());
    let request = RetrievalRequest::new(["cholera"], 1)
        .with_media_cloud_country("Chad")
        .with_geolocation_country("Chad")
        .with_news_only(true);

    retriever.retrieve(&request).await.unwrap();

    let requests = retriever.proxy().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query, "cholera site:alwihdainfo.com");
    assert_eq!(requests[0].country_code.as_deref(), Some("td"));
    let url = requests[0].search_url();
    assert!(url.contains("tbm=nws"));
    assert!(url.contains("gl=td"));
}

#[tokio::test]
async fn test_proxy_failure_aborts_run() {
    let proxy = MockSearchProxy::new()
        .with_results("cholera", 0, vec![SearchResult::new("https://a.com")])
        .fail_on("cholera", 20);
    let retriever = Retriever::new(proxy, catalog());

    let err = retriever
        .retrieve(&RetrievalRequest::new(["cholera"], 3))
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("failed to retrieve webpages"));
    match &err {
        CollectionError::Retrieval { source } => {
            assert!(matches!(source, SearchError::Status { status: 502, .. }));
        }
        other => panic!("expected retrieval error, got {other:?}"),
    }
    assert!(err.source().is_some());
    assert_eq!(retriever.proxy().requests().len(), 2);
}

#[tokio::test]
async fn test_retrieved_links_feed_extraction() {
    let retriever = Retriever::new(proxy(), catalog());
    let results = retriever.retrieve(&cholera_request()).await.unwrap();
    let urls: Vec<String> = web_collection::flatten_results(&results)
        .into_iter()
        .map(|r| r.result.link)
        .collect();

    let fetcher = MockPageFetcher::new()
        .with_page("https://a.com", "N'Djamena: [Chad](https://wiki/chad) logged 312 cases in March.")
        .with_page("https://c.com", "Chad reported 57 new cases.");
    let completion = MockCompletion::new()
        .with_response(
            "312 cases",
            r#"[{"country": "Chad", "cases": 312, "grounding_quote": "Chad logged 312 cases"}]"#,
        )
        .with_response(
            "57 new cases",
            r#"[{"country": "Chad", "cases": 57, "grounding_quote": "Chad reported 75 new cases"}]"#,
        )
        .with_default("[]");
    let extractor = DataExtractor::new(fetcher, completion);
    let schema = ExtractionSchema::new(
        "CholeraCases",
        vec![
            FieldDescriptor::new("country", FieldType::Str, "Reporting country"),
            FieldDescriptor::new("cases", FieldType::Int, "Reported cases"),
        ],
    )
    .unwrap();

    let datapoints = extractor
        .extract(&urls, &schema, &ExtractOptions::default())
        .await
        .unwrap();

    assert_eq!(datapoints.len(), 2);
    assert!(datapoints[0].is_grounded);
    assert_eq!(
        datapoints[0].source,
        "https://a.com#:~:text=Chad%20logged%20312%20cases"
    );
    assert!(!datapoints[1].is_grounded);
    assert_eq!(datapoints[1].source, "https://c.com");
}
