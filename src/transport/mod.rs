//! Transport trait: the seam between the engine and a model backend.
//!
//! Payload formats, HTTP mechanics and credentials belong to implementors;
//! the engine only sees [`GenerationRequest`] going out and either a
//! [`TransportResponse`] or a stream of [`StreamUnit`]s coming back.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TandemError;
use crate::types::{
    FinishReason, GenerationRequest, StreamUnit, ToolCallDelta, TransportResponse,
};

/// Stream of units produced by a streaming transport.
pub type UnitStream = BoxStream<'static, Result<StreamUnit, TandemError>>;

/// Core trait implemented by model backends.
///
/// Errors should be reported as [`TandemError::Transport`],
/// [`TandemError::Provider`] or [`TandemError::MalformedResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Send a request and wait for the full response.
    async fn send(&self, request: &GenerationRequest) -> Result<TransportResponse, TandemError>;

    /// Send a request and receive incremental units.
    ///
    /// The default implementation replays the non-streaming response as a
    /// single text unit followed by a terminal unit.
    async fn stream(&self, request: &GenerationRequest) -> Result<UnitStream, TandemError> {
        let response = self.send(request).await?;
        Ok(replay_as_stream(response))
    }
}

/// Turn a complete response into a unit stream (first candidate only).
pub fn replay_as_stream(response: TransportResponse) -> UnitStream {
    let usage = response.usage;
    let candidate = response.candidates.into_iter().next().unwrap_or_default();
    Box::pin(async_stream::stream! {
        if !candidate.text.is_empty() {
            yield Ok(StreamUnit::text(candidate.text));
        }
        if !candidate.tool_calls.is_empty() {
            let deltas = candidate
                .tool_calls
                .into_iter()
                .enumerate()
                .map(|(index, call)| ToolCallDelta {
                    index,
                    id: Some(call.id),
                    name: Some(call.name),
                    arguments: call.arguments,
                })
                .collect();
            yield Ok(StreamUnit {
                tool_call_deltas: deltas,
                ..StreamUnit::default()
            });
        }
        yield Ok(StreamUnit::finish(
            candidate.finish_reason.unwrap_or(FinishReason::Stop),
            usage,
        ));
    })
}
