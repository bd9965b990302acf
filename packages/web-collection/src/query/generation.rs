//! LLM-generated search queries and query templates.

use tracing::{debug, info};

use crate::error::{CollectionError, InputError, Result};
use crate::pipeline::prompts::{format_generate_queries_prompt, strip_code_fences};
use crate::traits::completion::Completion;

/// Most queries one call may request.
pub const MAX_GENERATED_QUERIES: usize = 10;

/// Generate search queries for a dataset description.
///
/// With `variable_names`, the model is asked for templates that contain
/// every `{variable}` placeholder; expand them with
/// [`expand_query_templates`](crate::query::template::expand_query_templates).
pub async fn generate_search_queries<C: Completion + ?Sized>(
    dataset_description: &str,
    num_queries: usize,
    completion: &C,
    variable_names: Option<&[String]>,
) -> Result<Vec<String>> {
    if !(1..=MAX_GENERATED_QUERIES).contains(&num_queries) {
        return Err(InputError::QueryCount(num_queries).into());
    }

    let prompt = format_generate_queries_prompt(dataset_description, num_queries, variable_names);
    let response = completion.complete(&prompt).await?;
    debug!(response_len = response.len(), "Received query generation response");

    let queries: Vec<String> = serde_json::from_str(strip_code_fences(&response)).map_err(|e| {
        CollectionError::ModelResponse(format!("expected a JSON array of strings: {e}"))
    })?;

    info!(requested = num_queries, generated = queries.len(), "Generated search queries");
    Ok(queries)
}
