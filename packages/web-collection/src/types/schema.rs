//! Declarative extraction schema.
//!
//! A schema is a named list of field descriptors. It renders to a JSON Schema
//! for the extraction prompt and validates the records the model returns.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::InputError;

/// Name of the field every record must carry for grounding.
pub const GROUNDING_QUOTE_FIELD: &str = "grounding_quote";

const GROUNDING_QUOTE_DESCRIPTION: &str = "Short span of text taken verbatim from the webpage \
from which the data is extracted (just a few words), EXACTLY as it appears in the text, DO NOT \
miss any words in the middle. DO NOT include \\ before apostrophes or other special characters.";

/// Allowed field value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "int", alias = "integer")]
    Int,
    #[serde(rename = "str", alias = "string")]
    Str,
    #[serde(rename = "bool", alias = "boolean")]
    Bool,
}

impl FieldType {
    fn json_type(self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Str => "string",
            Self::Bool => "boolean",
        }
    }

    /// Coerce a model-produced value into this type, if possible.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::Str, Value::String(_)) => Some(value.clone()),
            (Self::Bool, Value::Bool(_)) => Some(value.clone()),
            (Self::Bool, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Int, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(value.clone())
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| json!(f as i64))
                }
            }
            (Self::Int, Value::String(s)) => s
                .trim()
                .replace(',', "")
                .parse::<i64>()
                .ok()
                .map(|n| json!(n)),
            _ => None,
        }
    }
}

/// One field the model should extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: description.into(),
        }
    }
}

/// A named record type built from field descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    /// Record type name, used in the extraction instruction ("extract all mentioned <name>").
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl ExtractionSchema {
    /// Build a schema, rejecting empty, duplicate, or reserved field names.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self, InputError> {
        let schema = Self {
            name: name.into(),
            fields,
        };
        schema.check()?;
        Ok(schema)
    }

    /// Structural checks; also run on schemas deserialized from model output.
    pub fn check(&self) -> Result<(), InputError> {
        if self.name.trim().is_empty() {
            return Err(InputError::Schema("schema name is empty".into()));
        }
        if self.fields.is_empty() {
            return Err(InputError::Schema("schema has no fields".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(InputError::Schema("field with empty name".into()));
            }
            if field.name == GROUNDING_QUOTE_FIELD || field.name == "error" {
                return Err(InputError::Schema(format!("field name '{}' is reserved", field.name)));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(InputError::Schema(format!("duplicate field '{}'", field.name)));
            }
        }
        Ok(())
    }

    /// JSON Schema for one record, including the grounding quote.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::with_capacity(self.fields.len() + 1);

        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                json!({
                    "type": field.field_type.json_type(),
                    "description": field.description,
                }),
            );
            required.push(Value::String(field.name.clone()));
        }
        properties.insert(
            GROUNDING_QUOTE_FIELD.to_string(),
            json!({ "type": "string", "description": GROUNDING_QUOTE_DESCRIPTION }),
        );
        required.push(Value::String(GROUNDING_QUOTE_FIELD.to_string()));

        json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate a record against the schema, coercing values in place.
    ///
    /// Keys not declared in the schema are left untouched.
    pub fn validate(&self, record: &mut Map<String, Value>) -> Result<(), String> {
        for field in &self.fields {
            let value = record
                .get(&field.name)
                .ok_or_else(|| format!("missing field '{}'", field.name))?;
            let coerced = field.field_type.coerce(value).ok_or_else(|| {
                format!(
                    "field '{}' expected {}, got {}",
                    field.name,
                    field.field_type.json_type(),
                    value
                )
            })?;
            record.insert(field.name.clone(), coerced);
        }
        Ok(())
    }
}
