//! Sub-agents exposed to a parent as pseudo-tools.

use std::sync::Arc;

use super::controller::Agent;
use super::types::{HistoryMode, InteractionMode};
use crate::tools::ParameterShape;
use crate::types::ToolDefinition;

/// Argument carrying the parent's request to the sub-agent.
pub(crate) const INPUT_FIELD: &str = "input";

/// A sub-agent registered on a parent.
#[derive(Debug, Clone)]
pub(crate) struct SubAgentBinding {
    pub(crate) agent: Arc<Agent>,
    pub(crate) mode: InteractionMode,
    pub(crate) history: HistoryMode,
}

impl SubAgentBinding {
    pub(crate) fn name(&self) -> &str {
        self.agent.name()
    }

    pub(crate) fn shape() -> ParameterShape {
        ParameterShape::object()
            .string(INPUT_FIELD, "Request or task for the agent", true)
            .build()
    }

    /// Tool definition advertised to the parent's model.
    pub(crate) fn definition(&self) -> ToolDefinition {
        let description = match self.agent.settings().description.as_str() {
            "" => format!("Hand the task to the '{}' agent", self.name()),
            custom => custom.to_string(),
        };
        ToolDefinition {
            name: self.name().to_string(),
            description,
            parameters: Self::shape().schema,
        }
    }
}
