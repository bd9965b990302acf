//! Webpage retrieval through a SERP proxy.
//!
//! - [`orchestrator`] - Batch and streaming retrieval runs
//! - [`request`] - Query augmentation and SERP page URLs
//! - [`countries`] - Country code and outlet lookups
//! - [`seen`] - Per-run link deduplication
//! - [`rerank`] - Grouped reranking of retrieved text

pub mod countries;
pub mod orchestrator;
pub mod request;
pub mod rerank;
pub mod seen;

pub use countries::CountryCatalog;
pub use orchestrator::{CountryAssignment, RetrievalRequest, RetrievalStream, Retriever};
pub use request::{build_query, SearchPageRequest, MAX_SITE_FILTERS, RESULTS_PER_PAGE};
pub use rerank::{rerank_results, RankedDocument};
pub use seen::SeenRegistry;
