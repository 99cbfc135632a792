// Inbound fetch request parsing
//
// The fetch stage is invoked through API Gateway, a Function URL, or a
// direct invoke. All three carry a `body`; the HTTP front doors deliver it as
// a (possibly base64) JSON string, direct invokes may inline the object.

use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::error::PipelineError;

pub const CSV_URL_FIELD: &str = "csv_url";

/// The fields of an invocation event the fetch stage looks at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchInvocation {
    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default, rename = "isBase64Encoded")]
    pub is_base64_encoded: bool,
}

impl FetchInvocation {
    /// Invocation carrying `body` as a JSON string, as API Gateway sends it.
    pub fn from_json_body(body: impl Into<String>) -> Self {
        Self {
            body: Some(Value::String(body.into())),
            is_base64_encoded: false,
        }
    }

    /// Extract the required `csv_url` field.
    pub fn csv_url(&self) -> Result<String, PipelineError> {
        let body = match &self.body {
            None | Some(Value::Null) => return Err(PipelineError::missing_field("body", "event")),
            Some(Value::String(text)) => parse_body_text(text, self.is_base64_encoded)?,
            Some(object @ Value::Object(_)) => object.clone(),
            Some(other) => {
                return Err(PipelineError::invalid_request(format!(
                    "body must be a JSON object or a JSON string, got {}",
                    json_type(other)
                )))
            }
        };

        let object = body.as_object().ok_or_else(|| {
            PipelineError::invalid_request(format!(
                "body must be a JSON object, got {}",
                json_type(&body)
            ))
        })?;

        match object.get(CSV_URL_FIELD) {
            None | Some(Value::Null) => Err(PipelineError::missing_field(CSV_URL_FIELD, "body")),
            Some(Value::String(url)) => Ok(url.clone()),
            Some(other) => Err(PipelineError::invalid_request(format!(
                "{} must be a string, got {}",
                CSV_URL_FIELD,
                json_type(other)
            ))),
        }
    }
}

fn parse_body_text(text: &str, is_base64_encoded: bool) -> Result<Value, PipelineError> {
    let decoded;
    let raw = if is_base64_encoded {
        decoded = base64::engine::general_purpose::STANDARD
            .decode(text.as_bytes())
            .map_err(|e| PipelineError::invalid_request(format!("invalid base64 body: {}", e)))?;
        decoded.as_slice()
    } else {
        text.as_bytes()
    };

    serde_json::from_slice(raw)
        .map_err(|e| PipelineError::invalid_request(format!("body is not valid JSON: {}", e)))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
