//! Tool descriptors: name, declared shape, thread policy and handler.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use uuid::Uuid;

use super::arguments::ToolArguments;
use super::types::ParameterShape;
use crate::error::TandemError;
use crate::types::ToolDefinition;

/// Context available during tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolContext {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Session whose loop issued the call.
    pub session_id: Uuid,
}

/// Boxed handler invoked with decoded arguments.
pub type ToolHandler = dyn Fn(ToolArguments, ToolContext) -> BoxFuture<'static, Result<serde_json::Value, TandemError>>
    + Send
    + Sync;

/// A named, schema-described callable the model may invoke.
///
/// By default the handler runs on the primary context (the task driving the
/// session). Pure computations can opt into the worker pool with
/// [`ToolDescriptor::on_worker_context`].
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: ParameterShape,
    is_terminating: bool,
    execute_on_primary: bool,
    handler: Arc<ToolHandler>,
}

impl ToolDescriptor {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterShape,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, TandemError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            is_terminating: false,
            execute_on_primary: true,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Mark the tool as terminating: a successful call ends the agent loop
    /// once its batch completes.
    pub fn terminating(mut self) -> Self {
        self.is_terminating = true;
        self
    }

    /// Allow the handler to run on a worker task instead of the primary
    /// context.
    pub fn on_worker_context(mut self) -> Self {
        self.execute_on_primary = false;
        self
    }

    /// Tool name as advertised to the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared parameter shape.
    pub fn parameters(&self) -> &ParameterShape {
        &self.parameters
    }

    /// Whether a successful call ends the agent loop.
    pub fn is_terminating(&self) -> bool {
        self.is_terminating
    }

    /// Whether the handler runs on the awaiting task rather than a spawned worker.
    pub fn executes_on_primary(&self) -> bool {
        self.execute_on_primary
    }

    /// Definition advertised to the transport.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.schema.clone(),
        }
    }

    pub(crate) fn handler(&self) -> Arc<ToolHandler> {
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("is_terminating", &self.is_terminating)
            .field("execute_on_primary", &self.execute_on_primary)
            .finish()
    }
}
