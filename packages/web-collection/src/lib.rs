//! LLM-Assisted Web Data Collection Library
//!
//! Builds datasets from the open web: generate search queries for a dataset
//! description, expand them over template variables and date windows, collect
//! deduplicated Google results through a SERP proxy, extract schema-shaped
//! records from each page and keep only what the page actually says.
//!
//! # Pipeline
//!
//! 1. [`query`] - query generation and `{variable}` template expansion
//! 2. [`retrieval`] - date-chunked, site- and country-restricted SERP retrieval,
//!    in batch or as a stream
//! 3. [`pipeline`] - schema generation, extraction, grounding and quality control
//!
//! # Usage
//!
//! ```rust,ignore
//! use web_collection::{RetrievalRequest, Retriever};
//! use web_collection::testing::MockSearchProxy;
//!
//! let retriever = Retriever::with_bundled_countries(MockSearchProxy::new())?;
//! let request = RetrievalRequest::new(["cholera cases {country}"], 2)
//!     .with_variables([("country".to_string(), vec!["Chad".into(), "Mali".into()])].into())
//!     .with_start_date("2022-01-01")
//!     .with_end_date("2023-12-31")
//!     .with_time_chunking(true);
//!
//! let results = retriever.retrieve(&request).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Remote collaborator seams (search proxy, LLM, fetcher, OCR, reranker)
//! - [`types`] - Search results, schemas, datapoints and service configs
//! - [`dates`] - Date parsing and range chunking
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod dates;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod retrieval;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{CollectionError, InputError, Result, SearchError};
pub use traits::{
    completion::{Completion, OpenAiCompletion},
    date_extractor::{url_date, DateExtractor, HtmlDateExtractor},
    fetcher::{FirecrawlFetcher, PageFetcher},
    ocr::{MistralOcr, PdfTextExtractor},
    reranker::{JinaReranker, Reranker, ScoredText},
    searcher::{BrightDataProxy, SearchProxy},
};
pub use types::{
    config::{BrightDataConfig, FirecrawlConfig, JinaConfig, LlmConfig, MistralOcrConfig},
    datapoint::Datapoint,
    schema::{ExtractionSchema, FieldDescriptor, FieldType},
    search::{
        flatten_results, RetrievalResults, RetrievedResult, SearchResult, VariableCombination,
        VariableSet,
    },
};

pub use dates::{chunk_date_range, get_date_chunks, DateChunk};

// Re-export query and retrieval components
pub use query::{expand_query_templates, generate_search_queries, ExpandedQuery};
pub use retrieval::{
    rerank_results, CountryAssignment, CountryCatalog, RankedDocument, RetrievalRequest,
    RetrievalStream, Retriever,
};

// Re-export pipeline components
pub use pipeline::{
    check_grounding, control_quality, datapoint_rows, generate_extraction_schema, DataExtractor,
    ExtractOptions, ExtractionEvent, ExtractionStream, QualityIssues,
};
