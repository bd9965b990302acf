//! Model-assisted quality control of a collected dataset.
//!
//! The dataset is rendered as CSV with an `id` column and the model returns
//! one `ID: issue` line per row.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{CollectionError, Result};
use crate::pipeline::prompts::format_quality_control_prompt;
use crate::traits::completion::Completion;
use crate::types::datapoint::Datapoint;

/// Row issues keyed by row ID, in response order.
pub type QualityIssues = IndexMap<String, String>;

const ID_COLUMN: &str = "id";
const DROPPED_COLUMNS: &[&str] = &["url"];

/// Flat JSON rows for a list of datapoints.
pub fn datapoint_rows(datapoints: &[Datapoint]) -> Result<Vec<Map<String, Value>>> {
    datapoints
        .iter()
        .map(|d| match serde_json::to_value(d)? {
            Value::Object(row) => Ok(row),
            other => Err(CollectionError::ModelResponse(format!(
                "datapoint did not serialize to an object: {other}"
            ))),
        })
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Render rows as CSV for the quality control prompt.
///
/// The `url` column is dropped. The `id` column leads when present; otherwise
/// rows are numbered from 1. Columns follow first appearance across rows.
pub fn render_dataset_csv(rows: &[Map<String, Value>]) -> Result<String> {
    let has_id = rows.iter().any(|row| row.contains_key(ID_COLUMN));

    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            let key = key.as_str();
            if key != ID_COLUMN && !DROPPED_COLUMNS.contains(&key) && !columns.contains(&key) {
                columns.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(std::iter::once(ID_COLUMN).chain(columns.iter().copied()))?;

    for (index, row) in rows.iter().enumerate() {
        let id = if has_id {
            cell(row.get(ID_COLUMN))
        } else {
            (index + 1).to_string()
        };
        let record = std::iter::once(id).chain(columns.iter().map(|c| cell(row.get(*c))));
        writer.write_record(record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CollectionError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|e| CollectionError::ModelResponse(e.to_string()))
}

/// Parse `ID: issue` lines; lines without a colon or an integer ID are ignored.
pub fn parse_quality_response(content: &str) -> QualityIssues {
    content
        .trim()
        .lines()
        .filter_map(|line| {
            let (id, issue) = line.split_once(':')?;
            let id: i64 = id.trim().parse().ok()?;
            Some((id.to_string(), issue.trim().to_string()))
        })
        .collect()
}

/// Ask the model to flag problems in each row of the dataset.
pub async fn control_quality<C: Completion + ?Sized>(
    rows: &[Map<String, Value>],
    dataset_description: &str,
    completion: &C,
) -> Result<QualityIssues> {
    if rows.is_empty() {
        return Ok(QualityIssues::new());
    }

    let csv = render_dataset_csv(rows)?;
    debug!(rows = rows.len(), csv_len = csv.len(), "Rendered dataset for quality control");

    let prompt = format_quality_control_prompt(dataset_description, &csv);
    let response = completion.complete(&prompt).await?;
    let issues = parse_quality_response(&response);

    info!(rows = rows.len(), flagged = issues.len(), "Quality control complete");
    Ok(issues)
}
