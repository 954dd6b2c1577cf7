//! Streaming types.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::usage::Usage;

/// One unit received from a streaming transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamUnit {
    /// Incremental text since the previous unit.
    #[serde(default)]
    pub delta: String,
    /// Tool-call fragments carried by this unit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_deltas: Vec<ToolCallDelta>,
    /// Finish reason (typically only on the final unit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Usage (typically only on the final unit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamUnit {
    /// A unit carrying only a text delta.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            ..Self::default()
        }
    }

    /// A terminal unit with finish reason and usage.
    pub fn finish(finish_reason: FinishReason, usage: Usage) -> Self {
        Self {
            finish_reason: Some(finish_reason),
            usage: Some(usage),
            ..Self::default()
        }
    }
}

/// A fragment of a streamed tool call.
///
/// Fragments sharing an `index` belong to the same call; `id` and `name`
/// usually arrive on the first fragment only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}
