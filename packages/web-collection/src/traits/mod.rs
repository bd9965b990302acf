//! Trait seams for the remote collaborators.
//!
//! Each trait has one production implementation here; mocks for the search,
//! completion, fetch, OCR and rerank seams live in [`crate::testing`].

pub mod completion;
pub mod date_extractor;
pub mod fetcher;
pub mod ocr;
pub mod reranker;
pub mod searcher;
