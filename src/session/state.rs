//! State owned by a single session.

use crate::conversation::ConversationStore;
use crate::error::TandemError;
use crate::tools::ToolRegistry;
use crate::types::{GenerationConfig, GenerationResponse, Usage};

/// Conversation, tools and bookkeeping for one session.
///
/// Only reachable through the session's lock, so every mutation happens
/// inside the single active cycle or under an explicit `Session` call.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub conversation: ConversationStore,
    pub tools: ToolRegistry,
    pub config: GenerationConfig,
    /// Cycles run since the last reset (per prompt for agents).
    pub iteration_count: usize,
    pub last_error: Option<TandemError>,
    pub last_response: Option<GenerationResponse>,
    pub total_usage: Usage,
}

impl SessionState {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Clear conversation and counters.
    ///
    /// With `keep_config` the configuration and registered tools survive;
    /// otherwise both return to their defaults.
    pub fn reset(&mut self, keep_config: bool) {
        self.conversation.clear();
        self.iteration_count = 0;
        self.last_error = None;
        self.last_response = None;
        self.total_usage = Usage::default();
        if !keep_config {
            self.config = GenerationConfig::default();
            self.tools.clear();
        }
    }
}
