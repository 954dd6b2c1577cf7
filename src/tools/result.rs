//! Outcome of executing one tool call.

use serde::{Deserialize, Serialize};

/// Tagged outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum ToolExecutionResult {
    Success(String),
    Error(String),
    /// Returned by an intercept to fall through to default execution.
    Unhandled,
    /// Success that ends the agent loop after the current batch.
    Terminate(String),
}

impl ToolExecutionResult {
    /// Whether the call failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, Self::Terminate(_))
    }

    /// Text recorded in the tool-role message for this result.
    pub fn message_text(&self) -> String {
        match self {
            Self::Success(text) | Self::Terminate(text) => text.clone(),
            Self::Error(message) => serde_json::json!({ "error": message }).to_string(),
            Self::Unhandled => {
                serde_json::json!({ "error": "tool call was not handled" }).to_string()
            }
        }
    }
}

/// Render a handler's JSON output as message text.
pub(crate) fn output_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_results_render_as_json_error_object() {
        let text = ToolExecutionResult::Error("boom".into()).message_text();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["error"], "boom");
    }

    #[test]
    fn string_outputs_are_not_requoted() {
        assert_eq!(output_text(serde_json::json!("sunny")), "sunny");
        assert_eq!(output_text(serde_json::json!({"t": 21})), r#"{"t":21}"#);
    }
}
