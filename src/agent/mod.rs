//! Agents: sessions driven by an iteration-bounded tool loop.

pub mod controller;
pub(crate) mod delegation;
pub mod types;

pub use controller::Agent;
pub use types::{AgentRunResult, AgentState, HistoryMode, InteractionMode, PromptHandlers};
