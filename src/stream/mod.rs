//! Incremental delivery and aggregation of streamed units.

use std::collections::BTreeMap;

use crate::error::TandemError;
use crate::types::{FinishReason, StreamUnit, ToolCallDelta, ToolCallRequest, Usage};

/// Callback receiving each new text delta, never the cumulative buffer.
pub type StreamChunkHandler<'a> = Box<dyn FnMut(&str) + Send + 'a>;

/// Aggregated result of a fully drained stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Usage,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Forwards deltas to a callback while aggregating the stream.
///
/// Tool calls are assembled from indexed fragments and only resolved by
/// [`StreamDispatcher::finish`], after the stream has drained.
pub struct StreamDispatcher<F>
where
    F: FnMut(&str),
{
    on_chunk: F,
    buffer: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Usage,
}

impl<F> StreamDispatcher<F>
where
    F: FnMut(&str),
{
    pub fn new(on_chunk: F) -> Self {
        Self {
            on_chunk,
            buffer: String::new(),
            tool_calls: BTreeMap::new(),
            finish_reason: None,
            usage: Usage::default(),
        }
    }

    /// Absorb one unit, invoking the callback with its delta (if any).
    pub fn accept(&mut self, unit: StreamUnit) {
        if !unit.delta.is_empty() {
            self.buffer.push_str(&unit.delta);
            (self.on_chunk)(&unit.delta);
        }
        for delta in unit.tool_call_deltas {
            self.merge_tool_call(delta);
        }
        if let Some(reason) = unit.finish_reason {
            self.finish_reason = Some(reason);
        }
        if let Some(usage) = unit.usage {
            self.usage = usage;
        }
    }

    /// Resolve the aggregated stream.
    ///
    /// Tool calls are ordered by fragment index. A call that never received
    /// a name is a malformed response.
    pub fn finish(self) -> Result<StreamOutcome, TandemError> {
        let mut tool_calls = Vec::with_capacity(self.tool_calls.len());
        for (index, partial) in self.tool_calls {
            let name = partial.name.filter(|n| !n.is_empty()).ok_or_else(|| {
                TandemError::MalformedResponse(format!("streamed tool call {index} has no name"))
            })?;
            tool_calls.push(ToolCallRequest {
                id: partial.id.unwrap_or_else(|| format!("call_{index}")),
                name,
                arguments: partial.arguments,
            });
        }
        let finish_reason = self.finish_reason.or(Some(if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        }));
        Ok(StreamOutcome {
            text: self.buffer,
            tool_calls,
            finish_reason,
            usage: self.usage,
        })
    }

    fn merge_tool_call(&mut self, delta: ToolCallDelta) {
        let entry = self.tool_calls.entry(delta.index).or_default();
        if entry.id.is_none() {
            entry.id = delta.id.filter(|id| !id.is_empty());
        }
        if entry.name.is_none() {
            entry.name = delta.name.filter(|name| !name.is_empty());
        }
        entry.arguments.push_str(&delta.arguments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn callback_sees_only_new_deltas() {
        let mut seen = Vec::new();
        let mut dispatcher = StreamDispatcher::new(|delta: &str| seen.push(delta.to_string()));
        dispatcher.accept(StreamUnit::text("Hel"));
        dispatcher.accept(StreamUnit::text("lo"));
        dispatcher.accept(StreamUnit::text(""));
        dispatcher.accept(StreamUnit::finish(FinishReason::Stop, Usage::new(3, 2)));
        let outcome = dispatcher.finish().unwrap();

        assert_eq!(seen, vec!["Hel".to_string(), "lo".to_string()]);
        assert_eq!(outcome.text, "Hello");
        assert_eq!(outcome.usage, Usage::new(3, 2));
        assert_eq!(outcome.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn tool_call_fragments_assemble_in_index_order() {
        let mut dispatcher = StreamDispatcher::new(|_: &str| {});
        dispatcher.accept(StreamUnit {
            tool_call_deltas: vec![
                ToolCallDelta {
                    index: 1,
                    id: Some("b".into()),
                    name: Some("second".into()),
                    arguments: "{\"n\":".into(),
                },
                ToolCallDelta {
                    index: 0,
                    id: Some("a".into()),
                    name: Some("first".into()),
                    arguments: "{}".into(),
                },
            ],
            ..StreamUnit::default()
        });
        dispatcher.accept(StreamUnit {
            tool_call_deltas: vec![ToolCallDelta {
                index: 1,
                arguments: "2}".into(),
                ..ToolCallDelta::default()
            }],
            ..StreamUnit::default()
        });

        let outcome = dispatcher.finish().unwrap();
        assert_eq!(
            outcome.tool_calls,
            vec![
                ToolCallRequest::new("a", "first", "{}"),
                ToolCallRequest::new("b", "second", "{\"n\":2}"),
            ]
        );
        assert_eq!(outcome.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn nameless_tool_call_is_malformed() {
        let mut dispatcher = StreamDispatcher::new(|_: &str| {});
        dispatcher.accept(StreamUnit {
            tool_call_deltas: vec![ToolCallDelta {
                index: 0,
                arguments: "{}".into(),
                ..ToolCallDelta::default()
            }],
            ..StreamUnit::default()
        });
        assert!(matches!(
            dispatcher.finish(),
            Err(TandemError::MalformedResponse(_))
        ));
    }
}
