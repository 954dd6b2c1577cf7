//! Agent-layer value types and prompt callbacks.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::TandemError;
use crate::stream::StreamChunkHandler;
use crate::tools::{ToolExecutionResult, ToolInterceptor};
use crate::types::ToolCallRequest;

/// Position of an agent in its control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentState {
    Idle,
    AwaitingModel,
    ExecutingTools,
    /// The model answered without requesting tools.
    Completed,
    /// A terminating tool ran.
    Terminated,
    Failed,
    /// The cycle budget ran out. Not an error.
    IterationLimitReached,
    /// A stop was requested between iterations.
    Stopped,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::Terminated
                | Self::Failed
                | Self::IterationLimitReached
                | Self::Stopped
        )
    }
}

/// How a parent hands work to a sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InteractionMode {
    /// The sub-agent's answer becomes a tool result and the parent resumes.
    #[default]
    Delegation,
    /// The sub-agent's terminal state becomes the parent's.
    Handoff,
}

/// What a sub-agent sees of the parent's conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryMode {
    #[default]
    NoHistory,
    /// A copy of the parent's history up to the delegating call.
    FullHistory,
}

/// Outcome of a prompt, kept until the next prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRunResult {
    pub state: AgentState,
    pub final_text: String,
    /// Name of the agent that produced the final answer.
    pub responding_agent: String,
    pub terminating_tool: Option<String>,
    pub error: Option<TandemError>,
    /// Generate cycles run by the responding loop.
    pub iterations: usize,
}

impl AgentRunResult {
    /// True unless the run ended in `Failed`.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

type CompleteHandler<'a> = Box<dyn FnOnce(&AgentRunResult) + Send + 'a>;
type ErrorHandler<'a> = Box<dyn FnOnce(&TandemError) + Send + 'a>;

/// Callbacks for one `Agent::prompt` call, all run on the awaiting task.
#[derive(Default)]
pub struct PromptHandlers<'a> {
    pub(crate) on_complete: Option<CompleteHandler<'a>>,
    pub(crate) on_error: Option<ErrorHandler<'a>>,
    pub(crate) on_tool_call: Option<ToolInterceptor<'a>>,
    pub(crate) on_stream_chunk: Option<StreamChunkHandler<'a>>,
}

impl<'a> PromptHandlers<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires for every non-failed run, including iteration-limit and stop.
    pub fn on_complete(mut self, f: impl FnOnce(&AgentRunResult) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&TandemError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Intercept tool calls before default execution.
    ///
    /// Return [`ToolExecutionResult::Unhandled`] to run the registered tool.
    pub fn on_tool_call(
        mut self,
        f: impl FnMut(&ToolCallRequest) -> ToolExecutionResult + Send + 'a,
    ) -> Self {
        self.on_tool_call = Some(Box::new(f));
        self
    }

    pub fn on_stream_chunk(mut self, f: impl FnMut(&str) + Send + 'a) -> Self {
        self.on_stream_chunk = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for PromptHandlers<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptHandlers")
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_tool_call", &self.on_tool_call.is_some())
            .field("on_stream_chunk", &self.on_stream_chunk.is_some())
            .finish()
    }
}
