//! Structured-output parsing and tool-argument decoding.

use serde_json::Value;

use crate::tools::arguments::ToolArguments;
use crate::tools::types::ParameterShape;
use crate::tools::validation::check_shape;
use crate::types::ResponseFormat;

/// Parses raw model text into a structured object.
///
/// Returning `None` is a non-fatal parse failure: the cycle still completes
/// with the raw text.
pub trait SchemaProvider: Send + Sync {
    fn parse(&self, raw_text: &str, format: &ResponseFormat) -> Option<Value>;
}

/// Decodes a raw tool-call payload into the tool's declared shape.
pub trait ParameterCodec: Send + Sync {
    fn decode(
        &self,
        tool_name: &str,
        payload: &str,
        shape: &ParameterShape,
    ) -> Result<ToolArguments, String>;
}

/// JSON parser honoring markdown code fences and the declared schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaProvider;

impl SchemaProvider for JsonSchemaProvider {
    fn parse(&self, raw_text: &str, format: &ResponseFormat) -> Option<Value> {
        let value: Value = serde_json::from_str(strip_code_fences(raw_text)).ok()?;
        match format {
            ResponseFormat::Text => None,
            ResponseFormat::JsonObject => value.is_object().then_some(value),
            ResponseFormat::JsonSchema { schema, .. } => {
                check_shape(&value, schema).ok().map(|()| value)
            }
        }
    }
}

/// JSON decoder for tool arguments.
///
/// An empty payload decodes as `{}`; a payload that is itself a JSON string
/// holding an object is unwrapped once.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParameterCodec;

impl ParameterCodec for JsonParameterCodec {
    fn decode(
        &self,
        tool_name: &str,
        payload: &str,
        shape: &ParameterShape,
    ) -> Result<ToolArguments, String> {
        let trimmed = payload.trim();
        let mut value: Value = if trimmed.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON arguments: {e}"))?
        };
        if let Value::String(inner) = &value {
            if let Ok(unwrapped @ Value::Object(_)) = serde_json::from_str::<Value>(inner) {
                value = unwrapped;
            }
        }
        check_shape(&value, &shape.schema)?;
        Ok(ToolArguments::new(tool_name, value))
    }
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
