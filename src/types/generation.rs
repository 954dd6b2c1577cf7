//! Generation settings, requests and responses.

use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::{Message, ToolCallRequest};
use super::usage::Usage;

/// Settings controlling a generate cycle.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    #[builder(into)]
    pub model: Option<String>,
    /// Prepended to every request; never stored in the conversation.
    #[builder(into)]
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    /// Number of alternative candidates to request.
    pub candidate_count: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub tool_choice: Option<ToolChoice>,
    /// Per-call transport timeout.
    pub timeout_ms: Option<u64>,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Whether responses should be parsed as structured output.
    pub fn wants_structured_output(&self) -> bool {
        matches!(
            self.response_format,
            Some(ResponseFormat::JsonObject) | Some(ResponseFormat::JsonSchema { .. })
        )
    }
}

/// Requested response format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// How the model may pick tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// Tool definition sent to the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Snapshot of configuration and history taken at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub config: GenerationConfig,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// Whether the caller bound a streaming callback.
    pub stream: bool,
}

/// One alternative completion returned by the transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<FinishReason>,
}

impl Candidate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: String::new(),
            tool_calls,
            finish_reason: Some(FinishReason::ToolCalls),
        }
    }
}

/// Non-streaming transport result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportResponse {
    pub candidates: Vec<Candidate>,
    pub usage: Usage,
}

impl TransportResponse {
    /// A response holding a single candidate.
    pub fn single(candidate: Candidate, usage: Usage) -> Self {
        Self {
            candidates: vec![candidate],
            usage,
        }
    }
}

/// Result of one generate cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Usage,
    /// Present only when structured output was requested and parsed.
    pub parsed_output: Option<serde_json::Value>,
}
