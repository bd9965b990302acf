//! Search query generation and template expansion.

pub mod generation;
pub mod template;

pub use generation::{generate_search_queries, MAX_GENERATED_QUERIES};
pub use template::{
    expand_query_templates, expand_templates, normalize_variable_name, ExpandedQuery,
};
