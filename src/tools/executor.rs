//! Tool dispatch: intercept, decode, run on the declared context.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::warn;

use super::arguments::ToolArguments;
use super::registry::ToolRegistry;
use super::result::{output_text, ToolExecutionResult};
use super::tool::{ToolContext, ToolDescriptor};
use super::types::ParameterShape;
use crate::error::TandemError;
use crate::schema::{JsonParameterCodec, ParameterCodec};
use crate::types::ToolCallRequest;

/// Caller-supplied hook that sees every tool call before default execution.
///
/// Returning [`ToolExecutionResult::Unhandled`] falls through to the
/// registered handler; any other result is used verbatim.
pub type ToolInterceptor<'a> = Box<dyn FnMut(&ToolCallRequest) -> ToolExecutionResult + Send + 'a>;

/// Executes tool calls. Never fails: every fault becomes an
/// [`ToolExecutionResult::Error`].
#[derive(Clone)]
pub struct ToolExecutor {
    codec: Arc<dyn ParameterCodec>,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(Arc::new(JsonParameterCodec))
    }
}

impl ToolExecutor {
    /// Create an executor decoding arguments with `codec`.
    pub fn new(codec: Arc<dyn ParameterCodec>) -> Self {
        Self { codec }
    }

    /// Execute `call` against the registry, running the intercept first.
    ///
    /// Unknown tool names produce an error result rather than a fault.
    pub async fn execute_call(
        &self,
        registry: &ToolRegistry,
        call: &ToolCallRequest,
        ctx: ToolContext,
        intercept: Option<&mut ToolInterceptor<'_>>,
    ) -> ToolExecutionResult {
        if let Some(intercept) = intercept {
            let intercepted = intercept(call);
            if intercepted != ToolExecutionResult::Unhandled {
                return intercepted;
            }
        }
        match registry.find(&call.name) {
            Some(descriptor) => self.execute(&descriptor, call, ctx).await,
            None => {
                warn!(tool = %call.name, call_id = %call.id, "tool not found");
                ToolExecutionResult::Error(format!("Tool '{}' not found", call.name))
            }
        }
    }

    /// Decode a raw payload into `shape` with the configured codec.
    pub fn decode(
        &self,
        tool_name: &str,
        payload: &str,
        shape: &ParameterShape,
    ) -> Result<ToolArguments, TandemError> {
        self.codec
            .decode(tool_name, payload, shape)
            .map_err(|message| TandemError::ToolDecode {
                tool_name: tool_name.to_string(),
                message,
            })
    }

    /// Default execution: decode the payload, then invoke the handler on the
    /// primary context or a worker task per the descriptor's policy.
    pub async fn execute(
        &self,
        descriptor: &ToolDescriptor,
        call: &ToolCallRequest,
        ctx: ToolContext,
    ) -> ToolExecutionResult {
        let args = match self.decode(descriptor.name(), &call.arguments, descriptor.parameters()) {
            Ok(args) => args,
            Err(err) => {
                warn!(tool = %descriptor.name(), call_id = %call.id, error = %err, "tool arguments rejected");
                return ToolExecutionResult::Error(err.to_string());
            }
        };

        let handler = descriptor.handler();
        let outcome = if descriptor.executes_on_primary() {
            AssertUnwindSafe(async move { handler(args, ctx).await })
                .catch_unwind()
                .await
                .map_err(panic_message)
        } else {
            tokio::spawn(async move { handler(args, ctx).await })
                .await
                .map_err(|join_err| {
                    if join_err.is_panic() {
                        panic_message(join_err.into_panic())
                    } else {
                        "worker task was cancelled".to_string()
                    }
                })
        };

        match outcome {
            Ok(Ok(value)) if descriptor.is_terminating() => {
                ToolExecutionResult::Terminate(output_text(value))
            }
            Ok(Ok(value)) => ToolExecutionResult::Success(output_text(value)),
            Ok(Err(err)) => {
                warn!(tool = %descriptor.name(), call_id = %call.id, error = %err, "tool execution failed");
                ToolExecutionResult::Error(err.to_string())
            }
            Err(panic) => {
                let err = TandemError::ToolExecution {
                    tool_name: descriptor.name().to_string(),
                    message: format!("handler panicked: {panic}"),
                };
                warn!(tool = %descriptor.name(), call_id = %call.id, error = %err, "tool handler panicked");
                ToolExecutionResult::Error(err.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor").finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
