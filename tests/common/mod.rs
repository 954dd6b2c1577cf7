//! Shared test helpers and scripted transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use tandem::error::TandemError;
use tandem::tools::{ParameterShape, ToolDescriptor};
use tandem::transport::{replay_as_stream, Transport, UnitStream};
use tandem::types::*;

enum Step {
    Respond(TransportResponse),
    Fail(TandemError),
    Stream(Vec<StreamUnit>),
}

/// A transport that plays back queued responses in order.
///
/// Once the queue is empty it either repeats a tool call (with a fresh id
/// each time) or answers "Mock response".
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    repeat_tool: Mutex<Option<(String, serde_json::Value)>>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            repeat_tool: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    /// Queue a plain text answer.
    pub fn queue_text(&self, text: &str) -> &Self {
        self.push(Step::Respond(TransportResponse::single(
            Candidate::text(text),
            Usage::new(10, 20),
        )))
    }

    /// Queue a response requesting the given `(id, name, args)` calls.
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, serde_json::Value)]) -> &Self {
        let calls = calls
            .iter()
            .map(|(id, name, args)| ToolCallRequest::new(*id, *name, args.to_string()))
            .collect();
        self.push(Step::Respond(TransportResponse::single(
            Candidate::tool_calls(calls),
            Usage::new(10, 5),
        )))
    }

    pub fn queue_response(&self, response: TransportResponse) -> &Self {
        self.push(Step::Respond(response))
    }

    pub fn queue_error(&self, err: TandemError) -> &Self {
        self.push(Step::Fail(err))
    }

    /// Queue raw units for a streaming request.
    pub fn queue_stream(&self, units: Vec<StreamUnit>) -> &Self {
        self.push(Step::Stream(units))
    }

    /// After the queue drains, request `name` on every cycle.
    pub fn repeat_tool_call(&self, name: &str, args: serde_json::Value) -> &Self {
        *self.repeat_tool.lock().unwrap() = Some((name.to_string(), args));
        self
    }

    /// Delay every response by `delay`.
    pub fn with_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, step: Step) -> &Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    async fn next_step(&self, request: &GenerationRequest) -> Step {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(step) = self.steps.lock().unwrap().pop_front() {
            return step;
        }
        match self.repeat_tool.lock().unwrap().clone() {
            Some((name, args)) => Step::Respond(TransportResponse::single(
                Candidate::tool_calls(vec![ToolCallRequest::new(
                    format!("call_{n}"),
                    name,
                    args.to_string(),
                )]),
                Usage::new(10, 5),
            )),
            None => Step::Respond(TransportResponse::single(
                Candidate::text("Mock response"),
                Usage::default(),
            )),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &GenerationRequest) -> Result<TransportResponse, TandemError> {
        match self.next_step(request).await {
            Step::Respond(response) => Ok(response),
            Step::Fail(err) => Err(err),
            Step::Stream(_) => Err(TandemError::Transport(
                "stream queued for a non-streaming request".into(),
            )),
        }
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<UnitStream, TandemError> {
        match self.next_step(request).await {
            Step::Respond(response) => Ok(replay_as_stream(response)),
            Step::Fail(err) => Err(err),
            Step::Stream(units) => Ok(futures::stream::iter(units.into_iter().map(Ok)).boxed()),
        }
    }
}

/// A tool returning its `text` argument, counting invocations.
pub fn echo_tool(calls: Arc<AtomicUsize>) -> ToolDescriptor {
    ToolDescriptor::new(
        "echo",
        "Echo the text back",
        ParameterShape::object().string("text", "Text to echo", true).build(),
        move |args, _ctx| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::json!(args.get_str("text")?))
            }
        },
    )
}

/// A terminating tool that returns `reply`.
pub fn finish_tool(reply: &'static str) -> ToolDescriptor {
    ToolDescriptor::new(
        "finish",
        "End the task",
        ParameterShape::empty(),
        move |_args, _ctx| async move { Ok(serde_json::json!(reply)) },
    )
    .terminating()
}
