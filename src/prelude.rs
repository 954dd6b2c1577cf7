//! Convenience re-exports for common use.

pub use crate::config::{AgentSettings, TandemConfig};
pub use crate::error::{Result, TandemError};
pub use crate::session::{GenerateHandlers, Session};
pub use crate::tools::{
    ToolArguments, ToolContext, ToolDescriptor, ToolExecutionResult, ParameterShape,
};
pub use crate::transport::Transport;
pub use crate::types::{
    Candidate, FinishReason, GenerationConfig, GenerationResponse, Message, ResponseFormat, Role,
    ToolCallRequest, TransportResponse, Usage,
};

#[cfg(feature = "agent")]
pub use crate::agent::{Agent, AgentRunResult, AgentState, HistoryMode, InteractionMode, PromptHandlers};
