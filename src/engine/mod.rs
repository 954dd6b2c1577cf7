//! One request/response cycle against the transport.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::TandemError;
use crate::scheduler::CallbackScheduler;
use crate::schema::{JsonSchemaProvider, SchemaProvider};
use crate::session::SessionState;
use crate::stream::StreamDispatcher;
use crate::transport::Transport;
use crate::types::{
    Candidate, FinishReason, GenerationRequest, GenerationResponse, Message, StreamUnit,
    ToolCallRequest, ToolDefinition, Usage,
};
use crate::util::timeout::join_worker;

/// Callback picking one of several candidates by index.
pub type ChoiceSelector<'a> = Box<dyn FnMut(&[Candidate]) -> usize + Send + 'a>;

/// Per-cycle callbacks, invoked on the task awaiting the cycle.
#[derive(Default)]
pub struct CycleHooks<'h, 'a> {
    pub on_stream_chunk: Option<&'h mut (dyn FnMut(&str) + Send + 'a)>,
    pub on_choice_selection: Option<&'h mut (dyn FnMut(&[Candidate]) -> usize + Send + 'a)>,
}

/// Runs generate cycles for a session.
#[derive(Clone)]
pub struct GenerationEngine {
    transport: Arc<dyn Transport>,
    schema: Arc<dyn SchemaProvider>,
}

/// What a cycle produced before it is recorded.
struct CycleOutput {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
    finish_reason: Option<FinishReason>,
    usage: Usage,
}

impl GenerationEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            schema: Arc::new(JsonSchemaProvider),
        }
    }

    pub fn with_schema_provider(mut self, schema: Arc<dyn SchemaProvider>) -> Self {
        self.schema = schema;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Execute one cycle and record it in `state`.
    ///
    /// On success the assistant message is appended and `last_response`
    /// updated. On failure `last_error` is set and the conversation is left
    /// untouched. The iteration counter advances either way.
    pub async fn generate(
        &self,
        state: &mut SessionState,
        extra_tools: &[ToolDefinition],
        hooks: CycleHooks<'_, '_>,
    ) -> Result<GenerationResponse, TandemError> {
        let request = snapshot(state, extra_tools, hooks.on_stream_chunk.is_some());
        let timeout = state.config.timeout();

        let outcome = match hooks.on_stream_chunk {
            Some(on_chunk) => self.run_streaming(request, timeout, on_chunk).await,
            None => {
                self.run_blocking(request, timeout, hooks.on_choice_selection)
                    .await
            }
        };
        state.iteration_count += 1;

        let output = match outcome.and_then(check_tool_call_ids) {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    iteration = state.iteration_count,
                    transport = %self.transport.name(),
                    error = %err,
                    "generate cycle failed"
                );
                state.last_error = Some(err.clone());
                return Err(err);
            }
        };

        let parsed_output = self.parse_structured(state, &output.text);
        state
            .conversation
            .append_assistant(output.text.clone(), output.tool_calls.clone());
        state.total_usage.merge(&output.usage);

        let response = GenerationResponse {
            text: output.text,
            tool_calls: output.tool_calls,
            finish_reason: output.finish_reason,
            usage: output.usage,
            parsed_output,
        };
        debug!(
            iteration = state.iteration_count,
            tool_calls = response.tool_calls.len(),
            text_len = response.text.len(),
            total_tokens = response.usage.total_tokens(),
            "generate cycle complete"
        );
        state.last_error = None;
        state.last_response = Some(response.clone());
        Ok(response)
    }

    async fn run_blocking(
        &self,
        request: GenerationRequest,
        timeout: Option<Duration>,
        on_choice_selection: Option<&mut (dyn FnMut(&[Candidate]) -> usize + Send + '_)>,
    ) -> Result<CycleOutput, TandemError> {
        let transport = Arc::clone(&self.transport);
        let worker = tokio::spawn(async move { transport.send(&request).await });
        let response = join_worker(worker, timeout).await?;

        let mut candidates = response.candidates;
        if candidates.is_empty() {
            return Err(TandemError::MalformedResponse(
                "response contained no candidates".into(),
            ));
        }
        let mut index = 0;
        if candidates.len() > 1 {
            if let Some(select) = on_choice_selection {
                index = select(&candidates);
                if index >= candidates.len() {
                    warn!(
                        index,
                        candidates = candidates.len(),
                        "choice selection out of range, using first candidate"
                    );
                    index = 0;
                }
            }
        }
        let chosen = candidates.swap_remove(index);
        Ok(CycleOutput {
            text: chosen.text,
            tool_calls: chosen.tool_calls,
            finish_reason: chosen.finish_reason,
            usage: response.usage,
        })
    }

    async fn run_streaming(
        &self,
        request: GenerationRequest,
        timeout: Option<Duration>,
        on_chunk: &mut (dyn FnMut(&str) + Send + '_),
    ) -> Result<CycleOutput, TandemError> {
        let scheduler = CallbackScheduler::<StreamUnit>::new();
        let poster = scheduler.poster();
        let transport = Arc::clone(&self.transport);
        let worker = tokio::spawn(async move {
            let mut units = transport.stream(&request).await?;
            while let Some(unit) = units.next().await {
                if !poster.post(unit?) {
                    break;
                }
            }
            Ok::<(), TandemError>(())
        });

        let mut dispatcher = StreamDispatcher::new(|delta: &str| on_chunk(delta));
        scheduler
            .run_until(join_worker(worker, timeout), |unit| dispatcher.accept(unit))
            .await?;
        let outcome = dispatcher.finish()?;
        Ok(CycleOutput {
            text: outcome.text,
            tool_calls: outcome.tool_calls,
            finish_reason: outcome.finish_reason,
            usage: outcome.usage,
        })
    }

    fn parse_structured(&self, state: &SessionState, text: &str) -> Option<serde_json::Value> {
        if !state.config.wants_structured_output() {
            return None;
        }
        let format = state.config.response_format.as_ref()?;
        let parsed = self.schema.parse(text, format);
        if parsed.is_none() {
            let err = TandemError::StructuredOutputParse(format!(
                "response does not match requested format ({} chars)",
                text.len()
            ));
            warn!(iteration = state.iteration_count, error = %err, "structured output ignored");
        }
        parsed
    }
}

impl std::fmt::Debug for GenerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationEngine")
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}

/// Copy config, history and tool definitions into a request.
fn snapshot(state: &SessionState, extra_tools: &[ToolDefinition], stream: bool) -> GenerationRequest {
    let history = state.conversation.messages();
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(prompt) = state.config.system_prompt.as_deref() {
        messages.push(Message::system(prompt));
    }
    messages.extend_from_slice(history);

    let mut tools = state.tools.definitions();
    tools.extend_from_slice(extra_tools);

    GenerationRequest {
        config: state.config.clone(),
        messages,
        tools,
        stream,
    }
}

fn check_tool_call_ids(output: CycleOutput) -> Result<CycleOutput, TandemError> {
    let mut seen = HashSet::new();
    for call in &output.tool_calls {
        if call.id.is_empty() {
            return Err(TandemError::MalformedResponse(format!(
                "tool call '{}' has an empty id",
                call.name
            )));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(TandemError::MalformedResponse(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
    }
    Ok(output)
}
