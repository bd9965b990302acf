//! Extracted datapoint envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::GROUNDING_QUOTE_FIELD;

/// A record extracted from one page.
///
/// `fields` holds the model-defined values; the remaining fields are derived
/// by the pipeline. Serializes flat, so a datapoint looks like a single JSON
/// object with `grounding_quote`, `is_grounded` and `source` alongside the
/// extracted fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(default)]
    pub grounding_quote: Option<String>,

    #[serde(default)]
    pub is_grounded: bool,

    /// Page URL, with a `#:~:text=` locator when grounded.
    pub source: String,
}

impl Datapoint {
    /// Build an ungrounded datapoint from a raw model record.
    ///
    /// The `grounding_quote` key is lifted out of the record (non-string
    /// quotes are dropped); the `error` marker is removed.
    pub fn from_record(mut record: Map<String, Value>, url: impl Into<String>) -> Self {
        record.shift_remove("error");
        let grounding_quote = match record.shift_remove(GROUNDING_QUOTE_FIELD) {
            Some(Value::String(quote)) => Some(quote),
            _ => None,
        };
        Self {
            fields: record,
            grounding_quote,
            is_grounded: false,
            source: url.into(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_record_lifts_quote_and_error() {
        let record = json!({
            "company": "Acme",
            "grounding_quote": "Acme Corp",
            "error": false
        });
        let dp = Datapoint::from_record(record.as_object().unwrap().clone(), "https://a.com");

        assert_eq!(dp.grounding_quote.as_deref(), Some("Acme Corp"));
        assert!(dp.field("error").is_none());
        assert!(dp.field("grounding_quote").is_none());
        assert_eq!(dp.field("company"), Some(&json!("Acme")));
        assert_eq!(dp.source, "https://a.com");
    }

    #[test]
    fn test_serializes_flat() {
        let record = json!({ "revenue": 10 });
        let dp = Datapoint::from_record(record.as_object().unwrap().clone(), "https://a.com");
        let value = serde_json::to_value(&dp).unwrap();

        assert_eq!(value["revenue"], 10);
        assert_eq!(value["is_grounded"], false);
        assert_eq!(value["source"], "https://a.com");
    }
}
