//! Error types for Tandem.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Primary error type for all Tandem operations.
///
/// Every variant carries owned, cloneable data so an error can be stored in
/// session state and adopted across agents.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TandemError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Tool argument decode error in {tool_name}: {message}")]
    ToolDecode { tool_name: String, message: String },

    #[error("Tool execution error in {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Structured output parse error: {0}")]
    StructuredOutputParse(String),

    #[error("Message index {index} out of range for {len} messages")]
    MessageNotFound { index: isize, len: usize },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Provider-reported rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimited,
    Authentication,
    ContentFilter,
    UnsupportedFeature,
    Other,
}

/// Broad error category for routing handling logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Failure of a generate cycle; surfaces through `on_error`.
    Generation,
    /// Absorbed into a tool-role message; the loop continues.
    Tool,
    /// Non-fatal; the cycle still completes.
    StructuredOutput,
    Conversation,
    Configuration,
}

impl TandemError {
    /// Create a provider rejection error.
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_)
            | Self::Provider { .. }
            | Self::MalformedResponse(_)
            | Self::Timeout(_) => ErrorCategory::Generation,
            Self::ToolDecode { .. } | Self::ToolExecution { .. } => ErrorCategory::Tool,
            Self::StructuredOutputParse(_) => ErrorCategory::StructuredOutput,
            Self::MessageNotFound { .. } | Self::InvalidState(_) => ErrorCategory::Conversation,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether this error aborts a generate cycle.
    pub fn is_generation_error(&self) -> bool {
        self.category() == ErrorCategory::Generation
    }
}

impl From<serde_json::Error> for TandemError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TandemError>;
