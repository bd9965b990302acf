//! Extraction schema generation.

use tracing::{debug, info};

use crate::error::{CollectionError, Result};
use crate::pipeline::prompts::{format_generate_schema_prompt, strip_code_fences};
use crate::traits::completion::Completion;
use crate::types::schema::ExtractionSchema;

/// Ask the model for a schema covering `schema_fields` for the dataset.
///
/// The answer must be a JSON schema descriptor (`{name, fields}`) with field
/// types limited to int, str and bool.
pub async fn generate_extraction_schema<C: Completion + ?Sized>(
    dataset_description: &str,
    schema_fields: &[String],
    completion: &C,
) -> Result<ExtractionSchema> {
    let prompt = format_generate_schema_prompt(dataset_description, schema_fields);
    let response = completion.complete(&prompt).await?;
    debug!(response_len = response.len(), "Received schema response");

    let schema: ExtractionSchema = serde_json::from_str(strip_code_fences(&response))
        .map_err(|e| CollectionError::ModelResponse(format!("schema is not valid JSON: {e}")))?;
    schema
        .check()
        .map_err(|e| CollectionError::ModelResponse(e.to_string()))?;

    info!(name = %schema.name, fields = schema.fields.len(), "Generated extraction schema");
    Ok(schema)
}
