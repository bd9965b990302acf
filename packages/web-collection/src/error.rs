//! Typed errors for the collection library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match on
//! the failing stage: input validation, search retrieval, or one of the
//! remote collaborators.

use thiserror::Error;

/// Boxed error from a remote collaborator (HTTP client, JSON decoder, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during collection operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Caller input was rejected before any remote call was made
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// A search proxy request failed; the whole retrieval run is aborted
    #[error("failed to retrieve webpages: {source}")]
    Retrieval {
        #[source]
        source: SearchError,
    },

    /// Completion (LLM) service unavailable or failed
    #[error("LLM error: {0}")]
    Llm(#[source] BoxError),

    /// The model answered, but not in the expected shape
    #[error("unexpected model response: {0}")]
    ModelResponse(String),

    /// Page fetch (URL to markdown) failed
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },

    /// PDF OCR failed
    #[error("OCR failed for {url}: {source}")]
    Ocr {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Reranking service failed
    #[error("rerank error: {0}")]
    Rerank(#[source] BoxError),

    /// Configuration error (missing credential, unreadable data file)
    #[error("config error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// CSV rendering error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CollectionError {
    /// Wrap a search failure as a failed retrieval run.
    pub fn retrieval(source: SearchError) -> Self {
        Self::Retrieval { source }
    }
}

/// Errors returned by a search proxy for a single page request.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[source] BoxError),

    /// Non-success status from the proxy
    #[error("search proxy returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Body could not be decoded as a SERP response
    #[error("malformed search response: {0}")]
    MalformedResponse(String),
}

/// Validation errors, each naming the offending argument.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("num_queries must be between 1 and 10, got {0}")]
    QueryCount(usize),

    #[error("{argument} is not a valid YYYY-MM-DD date: '{value}'")]
    InvalidDate {
        argument: &'static str,
        value: String,
    },

    #[error("end_date {end} precedes start_date {start}")]
    InvertedDateRange { start: String, end: String },

    #[error("time chunking requires both start_date and end_date")]
    MissingDateBound,

    #[error("date range exceeds the supported calendar")]
    DateOutOfRange,

    #[error(
        "variable_name_with_assigned_countries ('{variable}') cannot be combined with a global \
         media cloud or geolocation country"
    )]
    ConflictingCountryAssignment { variable: String },

    #[error("geolocation_country: could not find country code for '{0}'")]
    UnknownGeolocationCountry(String),

    #[error("media_cloud_country: no Media Cloud sources for '{0}'")]
    UnknownMediaCloudCountry(String),

    #[error("queries and documents must have the same length ({queries} != {documents})")]
    RerankLengthMismatch { queries: usize, documents: usize },

    #[error("mistral_ocr_config is required when handle_pdfs is true")]
    MissingOcr,

    #[error("invalid extraction schema: {0}")]
    Schema(String),
}

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Result type alias for a single search proxy request.
pub type SearchOutcome<T> = std::result::Result<T, SearchError>;
