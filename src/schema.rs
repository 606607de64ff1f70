//! Structured response schemas for agent output.
//!
//! Agent drafts arrive as JSON text from the model. Instead of deserializing
//! blindly, each shape is constructed field by field with required/type/range
//! checks so a malformed draft is a distinct validation failure, never a
//! partially-filled success.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A schema-validated record the agent must produce as its final output.
///
/// Implementations parse a raw model draft field by field; there is no
/// reflection-style coercion anywhere.
pub trait StructuredOutput: Sized + Send {
    /// Schema name reported to the model provider.
    const NAME: &'static str;

    /// JSON schema used to constrain the model's output format.
    fn json_schema() -> Value;

    /// Validate a model draft (JSON text) against this shape.
    fn from_draft(draft: &str) -> Result<Self, SchemaError>;
}

/// Validation failure for a candidate structured response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("output is not valid JSON: {0}")]
    Json(String),
    #[error("output is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {field} has the wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("confidence_percentage {0} is outside [0, 100]")]
    OutOfRange(i64),
}

/// Reference-style answer from the documentation agent.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BotResponse {
    pub answer: String,
    pub reasoning: String,
    pub reference: Option<String>,
    pub confidence_percentage: u8,
}

impl BotResponse {
    /// Construct a validated response, rejecting out-of-range confidence.
    pub fn new(
        answer: String,
        reasoning: String,
        reference: Option<String>,
        confidence_percentage: i64,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            answer,
            reasoning,
            reference,
            confidence_percentage: check_confidence(confidence_percentage)?,
        })
    }

    /// Field-by-field construction from a parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let obj = value.as_object().ok_or(SchemaError::NotAnObject)?;

        let answer = required_string(obj, "answer")?;
        let reasoning = required_string(obj, "reasoning")?;
        let reference = optional_string(obj, "reference")?;
        let confidence = required_integer(obj, "confidence_percentage")?;

        Self::new(answer, reasoning, reference, confidence)
    }
}

impl StructuredOutput for BotResponse {
    const NAME: &'static str = "bot_response";

    fn from_draft(draft: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_str(draft).map_err(|e| SchemaError::Json(e.to_string()))?;
        Self::from_value(&value)
    }

    fn json_schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string"},
                "reasoning": {"type": "string"},
                "reference": {"type": ["string", "null"]},
                "confidence_percentage": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 100
                }
            },
            "required": ["answer", "reasoning", "confidence_percentage"],
            "additionalProperties": false
        })
    }
}

/// Browsing-style answer from the browser-automation agent.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BrowsingResponse {
    pub answer: String,
    pub reasoning: String,
    pub websites_accessed: Vec<String>,
    pub confidence_percentage: u8,
}

impl BrowsingResponse {
    pub fn new(
        answer: String,
        reasoning: String,
        websites_accessed: Vec<String>,
        confidence_percentage: i64,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            answer,
            reasoning,
            websites_accessed,
            confidence_percentage: check_confidence(confidence_percentage)?,
        })
    }

    /// Field-by-field construction from a parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let obj = value.as_object().ok_or(SchemaError::NotAnObject)?;

        let answer = required_string(obj, "answer")?;
        let reasoning = required_string(obj, "reasoning")?;
        let confidence = required_integer(obj, "confidence_percentage")?;

        // Absent list defaults to empty; a present non-list is a type error.
        let websites_accessed = match obj.get("websites_accessed") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut urls = Vec::with_capacity(items.len());
                for item in items {
                    let url = item.as_str().ok_or(SchemaError::WrongType {
                        field: "websites_accessed",
                        expected: "array of strings",
                    })?;
                    urls.push(url.to_string());
                }
                urls
            }
            Some(_) => {
                return Err(SchemaError::WrongType {
                    field: "websites_accessed",
                    expected: "array of strings",
                })
            }
        };

        Self::new(answer, reasoning, websites_accessed, confidence)
    }
}

impl StructuredOutput for BrowsingResponse {
    const NAME: &'static str = "browsing_response";

    fn from_draft(draft: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_str(draft).map_err(|e| SchemaError::Json(e.to_string()))?;
        Self::from_value(&value)
    }

    fn json_schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string"},
                "reasoning": {"type": "string"},
                "websites_accessed": {
                    "type": "array",
                    "items": {"type": "string"}
                },
                "confidence_percentage": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 100
                }
            },
            "required": ["answer", "reasoning", "confidence_percentage"],
            "additionalProperties": false
        })
    }
}

fn check_confidence(value: i64) -> Result<u8, SchemaError> {
    if (0..=100).contains(&value) {
        Ok(value as u8)
    } else {
        Err(SchemaError::OutOfRange(value))
    }
}

fn required_string(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(SchemaError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::WrongType {
            field,
            expected: "string",
        }),
    }
}

fn optional_string(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaError::WrongType {
            field,
            expected: "string",
        }),
    }
}

fn required_integer(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<i64, SchemaError> {
    let value = match obj.get(field) {
        None | Some(Value::Null) => return Err(SchemaError::MissingField(field)),
        Some(value) => value,
    };
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    // An int-valued float like 85.0 counts as an integer; 85.5 does not.
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => Ok(f as i64),
        _ => Err(SchemaError::WrongType {
            field,
            expected: "integer",
        }),
    }
}
