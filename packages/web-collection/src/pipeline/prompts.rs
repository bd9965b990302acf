//! LLM prompts for query generation, schema generation, extraction and
//! quality control.

/// Prompt for plain search queries.
pub const GENERATE_QUERIES_PROMPT: &str = r#"You are a helpful assistant that generates search queries. Focus on creating concise queries that will find individual data points or small pieces of information, NOT complete datasets or comprehensive lists. Each query should aim to find pages that contain just one or a few relevant pieces of information. Make sure to include important keywords from the dataset description in the query. Each query should be extremely short and straightforward and the first thing you think of. Do not try to be creative but instead mostly reuse words from the dataset description. Return ONLY a JSON array of query strings. Do not include any explanation or additional text.

Generate {num_queries} Google Search queries for the following dataset description:
{dataset_description}"#;

/// Prompt for query templates containing `{variable}` placeholders.
pub const GENERATE_QUERY_TEMPLATES_PROMPT: &str = r#"You are a helpful assistant that generates search query templates. Focus on creating concise templates that will find individual data points or small pieces of information, NOT complete datasets or comprehensive lists. Each template should aim to find pages that contain just one or a few relevant pieces of information. Make sure to include important keywords from the dataset description in the template. Each template should be extremely short and straightforward and the first thing you think of. Do not try to be creative but instead mostly reuse words from the dataset description. The templates MUST contain ALL the following placeholder variables, surrounded by curly braces: {variable_names}. Return ONLY a JSON array of template strings. Do not include any explanation or additional text.

Generate {num_queries} Google Search queries for the following dataset description:
{dataset_description}"#;

/// Prompt for a declarative extraction schema.
pub const GENERATE_SCHEMA_PROMPT: &str = r#"Generate an extraction schema based on a list of fields and a dataset description.

Guidelines:
1. Create one field for each item mentioned in the list of fields and data description.
2. Pick an appropriate data type for each field: int, str or bool. No other types are allowed.
3. Include a description for each field.
4. If there is a date field, use the format YYYY-MM-DD.
5. Field names are lowercase snake_case. The schema name is a short CamelCase noun phrase for one record.

Output JSON:
{
    "name": "RecordName",
    "fields": [
        {"name": "field_name", "type": "int" | "str" | "bool", "description": "Description of the field"}
    ]
}

Example:
For the list of fields "country", "date" and data description "Number of cholera cases", the output should be:
{
    "name": "CholeraCases",
    "fields": [
        {"name": "country", "type": "str", "description": "Name of the country for which the cholera case count is reported"},
        {"name": "date", "type": "str", "description": "Date for which the cholera case count is reported in YYYY-MM-DD format"},
        {"name": "cholera_cases", "type": "int", "description": "Number of reported cholera cases"}
    ]
}

Please generate the schema for the given list of fields: {schema_fields} and dataset description:
{dataset_description}.

Return ONLY the JSON object. Do not include any explanation or additional text."#;

/// Prompt for extracting records from one page.
pub const EXTRACT_PROMPT: &str = r#"{instruction}

Return a JSON array of objects. Each object must match this JSON Schema:
{json_schema}

If nothing on the page matches, return an empty array [].

Crawled content:
{content}"#;

/// Prompt for row-by-row sanity checks of a collected dataset.
pub const QUALITY_CONTROL_PROMPT: &str = r#"Below is a dataset collected by an LLM from the web from the prompt:
{dataset_description}

{extracted_data}

Your task is to examine each row and sanity check it, finding as many potential problems with it as possible and making sure it is consistent with the rest of the data. Output EXACTLY one line per ID. Do not miss any rows, do not output any extra rows and do not combine multiple rows' issues. Please always refer to the data points by their ID.

Format your response as follows:
{ID number}: sentence describing potential problems with the row corresponding to the ID, or output only "NA" if you find no issues in a row.
"#;

/// Format the query generation prompt; templates are requested when
/// variable names are given.
pub fn format_generate_queries_prompt(
    dataset_description: &str,
    num_queries: usize,
    variable_names: Option<&[String]>,
) -> String {
    match variable_names {
        Some(names) if !names.is_empty() => {
            let names = names
                .iter()
                .map(|n| format!("'{}'", n))
                .collect::<Vec<_>>()
                .join(", ");
            GENERATE_QUERY_TEMPLATES_PROMPT
                .replace("{variable_names}", &format!("[{}]", names))
                .replace("{num_queries}", &num_queries.to_string())
                .replace("{dataset_description}", dataset_description)
        }
        _ => GENERATE_QUERIES_PROMPT
            .replace("{num_queries}", &num_queries.to_string())
            .replace("{dataset_description}", dataset_description),
    }
}

/// Format the schema generation prompt.
pub fn format_generate_schema_prompt(dataset_description: &str, schema_fields: &[String]) -> String {
    let fields = schema_fields
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ");
    GENERATE_SCHEMA_PROMPT
        .replace("{schema_fields}", &fields)
        .replace("{dataset_description}", dataset_description)
}

/// Extraction instruction for a record type.
pub fn extraction_instruction(schema_name: &str, extra_instruction: Option<&str>) -> String {
    let mut instruction = format!(
        "From the crawled content, extract all mentioned {}. Only extract a value if it matches \
         what the field describes - no related or similar information. ",
        schema_name
    );
    if let Some(extra) = extra_instruction {
        instruction.push_str(extra);
    }
    instruction
}

/// Format the per-page extraction prompt.
pub fn format_extract_prompt(instruction: &str, json_schema: &str, content: &str) -> String {
    // Content goes last so placeholders inside page text are never expanded.
    EXTRACT_PROMPT
        .replace("{instruction}", instruction)
        .replace("{json_schema}", json_schema)
        .replace("{content}", content)
}

/// Format the quality control prompt with the CSV-rendered dataset.
pub fn format_quality_control_prompt(dataset_description: &str, extracted_data: &str) -> String {
    QUALITY_CONTROL_PROMPT
        .replace("{dataset_description}", dataset_description)
        .replace("{extracted_data}", extracted_data)
}

/// Remove Markdown code fences (```` ``` ```` / ```` ```json ````) around a model answer.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
