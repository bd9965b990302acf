//! Credential handling.
//!
//! Every remote collaborator (search proxy, LLM, reranker, OCR, crawler)
//! authenticates with a bearer token; tokens are held as [`SecretString`].

pub mod credentials;

pub use credentials::SecretString;
