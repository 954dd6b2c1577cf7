//! Callbacks bound to a single `Session::generate` call.

use crate::engine::ChoiceSelector;
use crate::error::TandemError;
use crate::stream::StreamChunkHandler;
use crate::types::{Candidate, GenerationResponse, ToolCallRequest};

type CompleteHandler<'a> = Box<dyn FnOnce(&GenerationResponse) + Send + 'a>;
type ErrorHandler<'a> = Box<dyn FnOnce(&TandemError) + Send + 'a>;
type ToolCallHandler<'a> = Box<dyn FnMut(&ToolCallRequest) + Send + 'a>;

/// Callbacks for one generate cycle.
///
/// All of them run on the task awaiting the cycle. `on_complete` and
/// `on_error` are mutually exclusive; `on_tool_call` fires once per
/// requested call, in model order, before `on_complete`.
#[derive(Default)]
pub struct GenerateHandlers<'a> {
    pub(crate) on_complete: Option<CompleteHandler<'a>>,
    pub(crate) on_error: Option<ErrorHandler<'a>>,
    pub(crate) on_stream_chunk: Option<StreamChunkHandler<'a>>,
    pub(crate) on_tool_call: Option<ToolCallHandler<'a>>,
    pub(crate) on_choice_selection: Option<ChoiceSelector<'a>>,
}

impl<'a> GenerateHandlers<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_complete(mut self, f: impl FnOnce(&GenerationResponse) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&TandemError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Request a streaming cycle; `f` receives each new text delta.
    pub fn on_stream_chunk(mut self, f: impl FnMut(&str) + Send + 'a) -> Self {
        self.on_stream_chunk = Some(Box::new(f));
        self
    }

    pub fn on_tool_call(mut self, f: impl FnMut(&ToolCallRequest) + Send + 'a) -> Self {
        self.on_tool_call = Some(Box::new(f));
        self
    }

    /// Choose among multiple candidates. Only consulted for non-streaming
    /// cycles that return more than one candidate.
    pub fn on_choice_selection(mut self, f: impl FnMut(&[Candidate]) -> usize + Send + 'a) -> Self {
        self.on_choice_selection = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for GenerateHandlers<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateHandlers")
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_stream_chunk", &self.on_stream_chunk.is_some())
            .field("on_tool_call", &self.on_tool_call.is_some())
            .field("on_choice_selection", &self.on_choice_selection.is_some())
            .finish()
    }
}
