//! Session: a conversation plus its generation configuration.
//!
//! A session admits one generate cycle at a time. A second concurrent
//! [`Session::generate`] waits on the session lock until the first has
//! finished, so conversation mutations never interleave.
//!
//! The lock is held while tool handlers run inside an agent loop, so a
//! handler must not await methods on the session that is driving it.

pub mod handlers;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::TandemConfig;
use crate::engine::{CycleHooks, GenerationEngine};
use crate::error::{Result, TandemError};
use crate::schema::{ParameterCodec, SchemaProvider};
use crate::tools::{ToolDescriptor, ToolExecutor};
use crate::transport::Transport;
use crate::types::{GenerationConfig, GenerationResponse, Message, Role, Usage};

pub use handlers::GenerateHandlers;
pub use state::SessionState;

/// Stateful holder of a conversation and its generation configuration.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    engine: GenerationEngine,
    executor: ToolExecutor,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
}

impl Session {
    /// Create a session over `transport` with default config and no tools.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine: GenerationEngine::new(transport),
            executor: ToolExecutor::default(),
            state: Mutex::new(SessionState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Create a session using the generation section of a layered config.
    pub fn from_config(transport: Arc<dyn Transport>, config: &TandemConfig) -> Self {
        Self::new(transport).with_config(config.generation.clone())
    }

    /// Replace the generation config.
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.state.get_mut().config = config;
        self
    }

    /// Register a tool.
    pub fn with_tool(mut self, descriptor: ToolDescriptor) -> Self {
        self.state.get_mut().tools.add(descriptor);
        self
    }

    /// Use a custom parser for structured output.
    pub fn with_schema_provider(mut self, schema: Arc<dyn SchemaProvider>) -> Self {
        self.engine = self.engine.with_schema_provider(schema);
        self
    }

    /// Use a custom decoder for tool arguments.
    pub fn with_parameter_codec(mut self, codec: Arc<dyn ParameterCodec>) -> Self {
        self.executor = ToolExecutor::new(codec);
        self
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run one generate cycle.
    ///
    /// Waits for any cycle already running on this session. Callbacks run
    /// after the session lock is released.
    pub async fn generate(&self, handlers: GenerateHandlers<'_>) -> Result<GenerationResponse> {
        let GenerateHandlers {
            on_complete,
            on_error,
            mut on_stream_chunk,
            mut on_tool_call,
            mut on_choice_selection,
        } = handlers;

        let mut state = self.state.lock().await;
        let flight = self.enter_flight();
        let hooks = CycleHooks {
            on_stream_chunk: on_stream_chunk.as_deref_mut(),
            on_choice_selection: on_choice_selection.as_deref_mut(),
        };
        let outcome = self.engine.generate(&mut state, &[], hooks).await;
        drop(flight);
        drop(state);

        match outcome {
            Ok(response) => {
                if let Some(notify) = on_tool_call.as_mut() {
                    for call in &response.tool_calls {
                        notify(call);
                    }
                }
                if let Some(on_complete) = on_complete {
                    on_complete(&response);
                }
                Ok(response)
            }
            Err(err) => {
                if let Some(on_error) = on_error {
                    on_error(&err);
                }
                Err(err)
            }
        }
    }

    /// Clear the conversation and counters.
    ///
    /// `keep_config = false` also restores the default configuration and
    /// unregisters every tool.
    pub async fn reset(&self, keep_config: bool) {
        self.state.lock().await.reset(keep_config);
    }

    /// Append a message, enforcing that tool results answer a prior call.
    pub async fn add_message(&self, message: Message) -> Result<()> {
        self.state.lock().await.conversation.push(message)
    }

    /// Append a user message.
    pub async fn add_user_message(&self, text: impl Into<String>) {
        self.state.lock().await.conversation.append(Role::User, text);
    }

    /// Append an assistant message without tool calls.
    pub async fn add_assistant_message(&self, text: impl Into<String>) {
        self.state
            .lock()
            .await
            .conversation
            .append(Role::Assistant, text);
    }

    /// Append a tool result.
    ///
    /// Fails with [`TandemError::InvalidState`] unless an earlier assistant
    /// message issued `tool_call_id`.
    pub async fn add_tool_result_message(
        &self,
        tool_call_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<()> {
        self.state
            .lock()
            .await
            .conversation
            .append_tool_result(tool_call_id, text)
    }

    /// Drop the whole conversation.
    pub async fn clear_messages(&self) {
        self.state.lock().await.conversation.clear();
    }

    /// Number of stored messages.
    pub async fn message_count(&self) -> usize {
        self.state.lock().await.conversation.len()
    }

    /// Message at `index`; negative indices count from the end.
    pub async fn message(&self, index: isize) -> Result<Message> {
        self.state.lock().await.conversation.get(index).cloned()
    }

    /// Text of the message at `index`; negative indices count from the end.
    pub async fn message_text(&self, index: isize) -> Result<String> {
        self.state
            .lock()
            .await
            .conversation
            .text(index)
            .map(str::to_string)
    }

    /// Snapshot of the whole conversation.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.conversation.messages().to_vec()
    }

    /// Number of messages with `role`.
    pub async fn count_by_role(&self, role: Role) -> usize {
        self.state.lock().await.conversation.count_by_role(role)
    }

    /// Index of the most recent message with `role`.
    pub async fn last_index_of(&self, role: Role) -> Option<usize> {
        self.state
            .lock()
            .await
            .conversation
            .last_index_matching(role)
    }

    /// Register a tool, returning the one it replaced.
    pub async fn add_tool(&self, descriptor: ToolDescriptor) -> Option<Arc<ToolDescriptor>> {
        self.state.lock().await.tools.add(descriptor)
    }

    /// Register several tools.
    pub async fn add_tools(&self, descriptors: impl IntoIterator<Item = ToolDescriptor> + Send) {
        let mut state = self.state.lock().await;
        for descriptor in descriptors {
            state.tools.add(descriptor);
        }
    }

    /// Unregister a tool by name.
    pub async fn remove_tool(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.state.lock().await.tools.remove(name)
    }

    /// Unregister every tool.
    pub async fn clear_tools(&self) {
        self.state.lock().await.tools.clear();
    }

    /// Look up a registered tool.
    pub async fn find_tool_by_name(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.state.lock().await.tools.find(name)
    }

    /// Number of registered tools.
    pub async fn tool_count(&self) -> usize {
        self.state.lock().await.tools.len()
    }

    /// Snapshot of the current generation config.
    pub async fn config(&self) -> GenerationConfig {
        self.state.lock().await.config.clone()
    }

    /// Replace the generation config for later cycles.
    pub async fn set_config(&self, config: GenerationConfig) {
        self.state.lock().await.config = config;
    }

    /// Edit the configuration in place.
    pub async fn update_config(&self, edit: impl FnOnce(&mut GenerationConfig) + Send) {
        edit(&mut self.state.lock().await.config);
    }

    /// Response of the last successful cycle.
    pub async fn last_response(&self) -> Option<GenerationResponse> {
        self.state.lock().await.last_response.clone()
    }

    /// Error of the last cycle, cleared by the next success.
    pub async fn last_error(&self) -> Option<TandemError> {
        self.state.lock().await.last_error.clone()
    }

    /// Generate cycles run since the last reset or prompt.
    pub async fn iteration_count(&self) -> usize {
        self.state.lock().await.iteration_count
    }

    /// Usage summed over every successful cycle since the last reset.
    pub async fn total_usage(&self) -> Usage {
        self.state.lock().await.total_usage
    }

    /// Whether a cycle or agent run currently holds this session.
    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    pub(crate) fn enter_flight(&self) -> FlightGuard<'_> {
        self.in_flight.store(true, Ordering::Release);
        FlightGuard(&self.in_flight)
    }

    pub(crate) fn engine(&self) -> &GenerationEngine {
        &self.engine
    }

    pub(crate) fn executor(&self) -> &ToolExecutor {
        &self.executor
    }
}

/// Clears the in-flight flag when the holder finishes.
pub(crate) struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
