//! Typed access to decoded tool arguments.

use crate::error::TandemError;

/// Decoded tool-call arguments, already checked against the tool's shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    tool_name: String,
    value: serde_json::Value,
}

impl ToolArguments {
    /// Wrap decoded arguments for `tool_name`.
    pub fn new(tool_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            value,
        }
    }

    /// The decoded JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.decode_error(format!("missing string argument '{key}'")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get a required integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| self.decode_error(format!("missing integer argument '{key}'")))
    }

    /// Get a required number argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| self.decode_error(format!("missing number argument '{key}'")))
    }

    /// Get a required boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| self.decode_error(format!("missing boolean argument '{key}'")))
    }

    /// Deserialize the whole argument object into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, TandemError> {
        serde_json::from_value(self.value.clone()).map_err(|e| self.decode_error(e.to_string()))
    }

    fn decode_error(&self, message: String) -> TandemError {
        TandemError::ToolDecode {
            tool_name: self.tool_name.clone(),
            message,
        }
    }
}
