//! Data types shared across the collection pipeline.

pub mod config;
pub mod datapoint;
pub mod schema;
pub mod search;
