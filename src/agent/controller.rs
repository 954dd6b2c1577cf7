//! The iteration-bounded agent loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::delegation::{SubAgentBinding, INPUT_FIELD};
use super::types::{AgentRunResult, AgentState, HistoryMode, InteractionMode, PromptHandlers};
use crate::config::{AgentSettings, TandemConfig};
use crate::conversation::ConversationStore;
use crate::engine::CycleHooks;
use crate::error::{Result, TandemError};
use crate::session::{Session, SessionState};
use crate::tools::{ToolContext, ToolExecutionResult, ToolInterceptor};
use crate::transport::Transport;
use crate::types::{Message, Role, ToolCallRequest, ToolDefinition};

/// How a tool batch ended.
enum BatchOutcome {
    Continue,
    Terminated { tool: String, text: String },
    HandedOff(AgentRunResult),
}

/// A session plus a tool-calling loop and optional sub-agents.
///
/// Each [`Agent::prompt`] appends the user text and then alternates between
/// generate cycles and tool batches until the model answers without tools,
/// a terminating tool runs, a hand-off completes, the cycle budget
/// (`max_api_requests`) runs out, a stop is requested, or a cycle fails.
#[derive(Debug)]
pub struct Agent {
    settings: AgentSettings,
    session: Session,
    sub_agents: RwLock<Vec<SubAgentBinding>>,
    state: watch::Sender<AgentState>,
    last_result: watch::Sender<Option<AgentRunResult>>,
    stop: Mutex<CancellationToken>,
}

impl Agent {
    /// Create an agent with its own session over `transport`.
    pub fn new(transport: Arc<dyn Transport>, settings: AgentSettings) -> Self {
        Self::from_session(Session::new(transport), settings)
    }

    /// Wrap an existing session.
    pub fn from_session(session: Session, settings: AgentSettings) -> Self {
        let (state, _) = watch::channel(AgentState::Idle);
        let (last_result, _) = watch::channel(None);
        Self {
            settings,
            session,
            sub_agents: RwLock::new(Vec::new()),
            state,
            last_result,
            stop: Mutex::new(CancellationToken::new()),
        }
    }

    /// Build from a layered config: generation settings go to the session,
    /// agent settings to the loop.
    pub fn from_config(transport: Arc<dyn Transport>, config: &TandemConfig) -> Self {
        Self::from_session(Session::from_config(transport, config), config.agent.clone())
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// The underlying session, for messages, tools and configuration.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current loop state.
    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Result of the most recent prompt (or delegated run).
    pub fn last_result(&self) -> Option<AgentRunResult> {
        self.last_result.borrow().clone()
    }

    /// Register a sub-agent, exposed to the model as a tool named after it.
    ///
    /// A sub-agent name shadows a registered tool with the same name.
    pub fn add_agent(
        &self,
        agent: Arc<Agent>,
        mode: InteractionMode,
        history: HistoryMode,
    ) -> Result<()> {
        if agent.name() == self.name() || agent.reaches(self.name()) {
            return Err(TandemError::InvalidState(format!(
                "agent '{}' cannot be a sub-agent of itself",
                self.name()
            )));
        }
        let mut sub_agents = self.sub_agents.write().unwrap_or_else(PoisonError::into_inner);
        if sub_agents.iter().any(|b| b.name() == agent.name()) {
            return Err(TandemError::InvalidState(format!(
                "sub-agent '{}' is already registered on '{}'",
                agent.name(),
                self.name()
            )));
        }
        debug!(parent = %self.name(), sub_agent = %agent.name(), %mode, %history, "sub-agent added");
        sub_agents.push(SubAgentBinding {
            agent,
            mode,
            history,
        });
        Ok(())
    }

    /// Names of the registered sub-agents, in registration order.
    pub fn sub_agent_names(&self) -> Vec<String> {
        self.sub_agents_snapshot()
            .iter()
            .map(|b| b.name().to_string())
            .collect()
    }

    /// Ask the running loop to stop before its next cycle.
    ///
    /// Propagates to sub-agents running on the loop's behalf. Has no effect
    /// when no prompt is running.
    pub fn request_stop(&self) {
        lock(&self.stop).cancel();
    }

    /// Clear the conversation and return to `Idle`.
    pub async fn reset(&self, keep_config: bool) {
        self.session.reset(keep_config).await;
        self.state.send_replace(AgentState::Idle);
        self.last_result.send_replace(None);
    }

    /// Append `text` as a user message and run the loop to a terminal state.
    ///
    /// Waits for any cycle already running on the session. A failed run
    /// returns the error; every other terminal state returns `Ok`.
    pub async fn prompt(
        &self,
        text: impl Into<String>,
        handlers: PromptHandlers<'_>,
    ) -> Result<AgentRunResult> {
        let PromptHandlers {
            on_complete,
            on_error,
            mut on_tool_call,
            mut on_stream_chunk,
        } = handlers;
        let text = text.into();

        let mut state = self.session.lock_state().await;
        let flight = self.session.enter_flight();
        let stop = self.install_stop(CancellationToken::new());
        state.conversation.append(Role::User, text);
        let result = self
            .run_loop(
                &mut state,
                &stop,
                on_tool_call.as_mut(),
                on_stream_chunk.as_deref_mut(),
            )
            .await;
        drop(flight);
        drop(state);

        self.record(&result);
        if let Some(err) = result.error.clone() {
            if let Some(on_error) = on_error {
                on_error(&err);
            }
            return Err(err);
        }
        if let Some(on_complete) = on_complete {
            on_complete(&result);
        }
        Ok(result)
    }

    /// Run on behalf of a parent with a fresh conversation seeded from
    /// `seed`.
    fn run_delegated<'s>(
        &'s self,
        seed: Vec<Message>,
        input: String,
        parent_stop: &CancellationToken,
    ) -> BoxFuture<'s, AgentRunResult> {
        let child = parent_stop.child_token();
        Box::pin(async move {
            let mut state = self.session.lock_state().await;
            let flight = self.session.enter_flight();
            let stop = self.install_stop(child);
            state.conversation = ConversationStore::from_messages(seed);
            state.conversation.append(Role::User, input);
            let result = self.run_loop(&mut state, &stop, None, None).await;
            drop(flight);
            drop(state);
            self.record(&result);
            result
        })
    }

    async fn run_loop(
        &self,
        state: &mut SessionState,
        stop: &CancellationToken,
        mut intercept: Option<&mut ToolInterceptor<'_>>,
        mut on_chunk: Option<&mut (dyn FnMut(&str) + Send + '_)>,
    ) -> AgentRunResult {
        let sub_agents = self.sub_agents_snapshot();
        let extra_tools: Vec<ToolDefinition> =
            sub_agents.iter().map(SubAgentBinding::definition).collect();
        let budget = self.settings.max_api_requests.max(1);
        state.iteration_count = 0;
        let mut last_text = String::new();

        loop {
            if stop.is_cancelled() {
                debug!(agent = %self.name(), iteration = state.iteration_count, "stop requested");
                return self.finished(AgentState::Stopped, last_text, state.iteration_count);
            }
            if state.iteration_count >= budget {
                debug!(agent = %self.name(), budget, "iteration limit reached");
                return self.finished(
                    AgentState::IterationLimitReached,
                    last_text,
                    state.iteration_count,
                );
            }

            self.state.send_replace(AgentState::AwaitingModel);
            let hooks = CycleHooks {
                on_stream_chunk: on_chunk.as_deref_mut(),
                on_choice_selection: None,
            };
            let response = match self
                .session
                .engine()
                .generate(state, &extra_tools, hooks)
                .await
            {
                Ok(response) => response,
                Err(err) => return self.failed(err, last_text, state.iteration_count),
            };
            if !response.text.is_empty() {
                last_text = response.text.clone();
            }
            if response.tool_calls.is_empty() {
                return self.finished(AgentState::Completed, response.text, state.iteration_count);
            }

            self.state.send_replace(AgentState::ExecutingTools);
            let batch = self
                .execute_batch(
                    state,
                    &response.tool_calls,
                    &sub_agents,
                    stop,
                    intercept.as_deref_mut(),
                )
                .await;
            match batch {
                Ok(BatchOutcome::Continue) => {}
                Ok(BatchOutcome::Terminated { tool, text }) => {
                    debug!(agent = %self.name(), tool = %tool, "terminating tool ran");
                    let mut result =
                        self.finished(AgentState::Terminated, text, state.iteration_count);
                    result.terminating_tool = Some(tool);
                    return result;
                }
                Ok(BatchOutcome::HandedOff(result)) => {
                    debug!(
                        agent = %self.name(),
                        responding_agent = %result.responding_agent,
                        state = %result.state,
                        "hand-off complete"
                    );
                    return result;
                }
                Err(err) => return self.failed(err, last_text, state.iteration_count),
            }
        }
    }

    /// Run every call in model order and record each result.
    ///
    /// The first terminating call or hand-off decides the outcome, but the
    /// rest of the batch still runs.
    async fn execute_batch(
        &self,
        state: &mut SessionState,
        calls: &[ToolCallRequest],
        sub_agents: &[SubAgentBinding],
        stop: &CancellationToken,
        mut intercept: Option<&mut ToolInterceptor<'_>>,
    ) -> Result<BatchOutcome> {
        // Index of the assistant message that issued this batch.
        let issued_at = state.conversation.len().saturating_sub(1);
        let mut outcome = BatchOutcome::Continue;

        for call in calls {
            let result = match sub_agents.iter().find(|b| b.name() == call.name) {
                Some(binding) => {
                    let seed = match binding.history {
                        HistoryMode::NoHistory => Vec::new(),
                        HistoryMode::FullHistory => {
                            state.conversation.messages()[..issued_at].to_vec()
                        }
                    };
                    let (result, handed_off) = self.call_sub_agent(binding, call, seed, stop).await;
                    if let Some(run) = handed_off {
                        if matches!(outcome, BatchOutcome::Continue) {
                            outcome = BatchOutcome::HandedOff(run);
                        }
                    }
                    result
                }
                None => {
                    let ctx = ToolContext {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        session_id: self.session.id(),
                    };
                    let result = self
                        .session
                        .executor()
                        .execute_call(&state.tools, call, ctx, intercept.as_deref_mut())
                        .await;
                    if let ToolExecutionResult::Terminate(text) = &result {
                        if matches!(outcome, BatchOutcome::Continue) {
                            outcome = BatchOutcome::Terminated {
                                tool: call.name.clone(),
                                text: text.clone(),
                            };
                        }
                    }
                    result
                }
            };
            if result.is_error() {
                debug!(agent = %self.name(), tool = %call.name, "tool returned an error result");
            }
            state
                .conversation
                .append_tool_result(call.id.clone(), result.message_text())?;
        }
        Ok(outcome)
    }

    /// Invoke a sub-agent. Returns the tool result for the parent and, for
    /// a hand-off, the run the parent adopts.
    async fn call_sub_agent(
        &self,
        binding: &SubAgentBinding,
        call: &ToolCallRequest,
        seed: Vec<Message>,
        stop: &CancellationToken,
    ) -> (ToolExecutionResult, Option<AgentRunResult>) {
        let input = self
            .session
            .executor()
            .decode(binding.name(), &call.arguments, &SubAgentBinding::shape())
            .and_then(|args| args.get_str(INPUT_FIELD).map(str::to_string));
        let input = match input {
            Ok(input) => input,
            Err(err) => {
                warn!(agent = %self.name(), sub_agent = %binding.name(), error = %err, "sub-agent arguments rejected");
                return (ToolExecutionResult::Error(err.to_string()), None);
            }
        };

        debug!(
            agent = %self.name(),
            sub_agent = %binding.name(),
            mode = %binding.mode,
            history = %binding.history,
            seeded = seed.len(),
            "invoking sub-agent"
        );
        let run = binding.agent.run_delegated(seed, input, stop).await;
        let result = if run.is_success() {
            ToolExecutionResult::Success(run.final_text.clone())
        } else {
            let message = run.error.as_ref().map(ToString::to_string).unwrap_or_default();
            ToolExecutionResult::Error(message)
        };
        match binding.mode {
            InteractionMode::Delegation => (result, None),
            InteractionMode::Handoff => (result, Some(run)),
        }
    }

    fn finished(&self, state: AgentState, final_text: String, iterations: usize) -> AgentRunResult {
        AgentRunResult {
            state,
            final_text,
            responding_agent: self.name().to_string(),
            terminating_tool: None,
            error: None,
            iterations,
        }
    }

    fn failed(&self, err: TandemError, last_text: String, iterations: usize) -> AgentRunResult {
        warn!(agent = %self.name(), iteration = iterations, error = %err, "agent run failed");
        AgentRunResult {
            error: Some(err),
            ..self.finished(AgentState::Failed, last_text, iterations)
        }
    }

    fn record(&self, result: &AgentRunResult) {
        self.state.send_replace(result.state);
        self.last_result.send_replace(Some(result.clone()));
    }

    fn install_stop(&self, token: CancellationToken) -> CancellationToken {
        *lock(&self.stop) = token.clone();
        token
    }

    fn sub_agents_snapshot(&self) -> Vec<SubAgentBinding> {
        self.sub_agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether `name` is this agent or reachable through its sub-agents.
    fn reaches(&self, name: &str) -> bool {
        self.name() == name
            || self
                .sub_agents_snapshot()
                .iter()
                .any(|b| b.agent.reaches(name))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
