//! Tests for sessions: generate cycles, callbacks and conversation access.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{echo_tool, ScriptedTransport};
use pretty_assertions::assert_eq;
use serde_json::json;
use tandem::error::TandemError;
use tandem::prelude::*;
use tandem::types::{StreamUnit, ToolCallDelta};

#[tokio::test]
async fn generate_appends_assistant_message_and_fires_on_complete() {
    let transport = ScriptedTransport::new();
    transport.queue_text("Hello back");
    let session = Session::new(transport.clone());
    session.add_user_message("Hello").await;

    let completed = Mutex::new(None);
    let errored = AtomicUsize::new(0);
    let response = session
        .generate(
            GenerateHandlers::new()
                .on_complete(|r| *completed.lock().unwrap() = Some(r.text.clone()))
                .on_error(|_| {
                    errored.fetch_add(1, Ordering::SeqCst);
                }),
        )
        .await
        .unwrap();

    assert_eq!(response.text, "Hello back");
    assert_eq!(completed.lock().unwrap().as_deref(), Some("Hello back"));
    assert_eq!(errored.load(Ordering::SeqCst), 0);
    assert_eq!(session.message_count().await, 2);
    assert_eq!(session.message_text(-1).await.unwrap(), "Hello back");
    assert_eq!(session.iteration_count().await, 1);
    assert_eq!(session.total_usage().await, Usage::new(10, 20));
}

#[tokio::test]
async fn transport_failure_fires_only_on_error() {
    let transport = ScriptedTransport::new();
    transport.queue_error(TandemError::Provider {
        kind: tandem::error::ProviderErrorKind::RateLimited,
        message: "slow down".into(),
    });
    let session = Session::new(transport);
    session.add_user_message("Hello").await;

    let completed = AtomicUsize::new(0);
    let seen_error = Mutex::new(None);
    let err = session
        .generate(
            GenerateHandlers::new()
                .on_complete(|_| {
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(|e| *seen_error.lock().unwrap() = Some(e.clone())),
        )
        .await
        .unwrap_err();

    assert!(err.is_generation_error());
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(seen_error.lock().unwrap().clone(), Some(err.clone()));
    assert_eq!(session.last_error().await, Some(err));
    assert_eq!(session.message_count().await, 1);
}

#[tokio::test]
async fn on_tool_call_reports_calls_in_model_order() {
    let transport = ScriptedTransport::new();
    transport.queue_tool_calls(&[
        ("c1", "echo", json!({"text": "a"})),
        ("c2", "lookup", json!({})),
    ]);
    let session = Session::new(transport);
    session.add_user_message("go").await;

    let mut seen = Vec::new();
    let response = session
        .generate(GenerateHandlers::new().on_tool_call(|call| seen.push(call.id.clone())))
        .await
        .unwrap();

    assert_eq!(seen, vec!["c1".to_string(), "c2".to_string()]);
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
    let assistant = session.message(-1).await.unwrap();
    assert_eq!(assistant.tool_calls.len(), 2);

    session.add_tool_result_message("c1", "a").await.unwrap();
    let err = session
        .add_tool_result_message("unknown", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::InvalidState(_)));
}

#[tokio::test]
async fn streaming_cycle_delivers_only_deltas() {
    let transport = ScriptedTransport::new();
    transport.queue_stream(vec![
        StreamUnit::text("The "),
        StreamUnit::text("answer "),
        StreamUnit::text("is 42"),
        StreamUnit::finish(FinishReason::Stop, Usage::new(7, 3)),
    ]);
    let session = Session::new(transport.clone());
    session.add_user_message("question").await;

    let mut chunks = Vec::new();
    let response = session
        .generate(GenerateHandlers::new().on_stream_chunk(|delta| chunks.push(delta.to_string())))
        .await
        .unwrap();

    assert_eq!(chunks, vec!["The ", "answer ", "is 42"]);
    assert_eq!(response.text, "The answer is 42");
    assert_eq!(response.usage, Usage::new(7, 3));
    assert!(transport.requests()[0].stream);
    assert_eq!(session.message_text(-1).await.unwrap(), "The answer is 42");
}

#[tokio::test]
async fn streamed_tool_call_fragments_resolve_after_drain() {
    let transport = ScriptedTransport::new();
    transport.queue_stream(vec![
        StreamUnit {
            tool_call_deltas: vec![ToolCallDelta {
                index: 0,
                id: Some("s1".into()),
                name: Some("echo".into()),
                arguments: "{\"te".into(),
            }],
            ..StreamUnit::default()
        },
        StreamUnit {
            tool_call_deltas: vec![ToolCallDelta {
                index: 0,
                arguments: "xt\":\"hi\"}".into(),
                ..ToolCallDelta::default()
            }],
            ..StreamUnit::default()
        },
    ]);
    let session = Session::new(transport);

    let mut chunks = 0;
    let response = session
        .generate(GenerateHandlers::new().on_stream_chunk(|_| chunks += 1))
        .await
        .unwrap();

    assert_eq!(chunks, 0);
    assert_eq!(
        response.tool_calls,
        vec![ToolCallRequest::new("s1", "echo", "{\"text\":\"hi\"}")]
    );
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
}

#[tokio::test]
async fn choice_selection_chooses_among_candidates() {
    let transport = ScriptedTransport::new();
    transport.queue_response(TransportResponse {
        candidates: vec![
            Candidate::text("short"),
            Candidate::text("a much longer answer"),
        ],
        usage: Usage::default(),
    });
    let session = Session::new(transport);

    let response = session
        .generate(GenerateHandlers::new().on_choice_selection(|candidates| {
            candidates
                .iter()
                .enumerate()
                .max_by_key(|(_, c)| c.text.len())
                .map(|(i, _)| i)
                .unwrap_or(0)
        }))
        .await
        .unwrap();

    assert_eq!(response.text, "a much longer answer");
}

#[tokio::test]
async fn system_prompt_is_sent_but_not_stored() {
    let transport = ScriptedTransport::new();
    let session = Session::new(transport.clone()).with_config(
        GenerationConfig::builder()
            .model("test-model")
            .system_prompt("You are terse.")
            .build(),
    );
    session.add_user_message("hi").await;
    session.generate(GenerateHandlers::new()).await.unwrap();

    let requests = transport.requests();
    let sent = &requests[0];
    assert_eq!(sent.messages[0].role, Role::System);
    assert_eq!(sent.messages[0].text, "You are terse.");
    assert_eq!(sent.config.model.as_deref(), Some("test-model"));
    assert_eq!(session.count_by_role(Role::System).await, 0);
}

#[tokio::test]
async fn concurrent_generates_are_serialized() {
    let transport = ScriptedTransport::new();
    transport
        .with_delay(Duration::from_millis(20))
        .queue_text("first")
        .queue_text("second");
    let session = Arc::new(Session::new(transport.clone()));
    session.add_user_message("start").await;

    let a = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.generate(GenerateHandlers::new()).await })
    };
    let b = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.generate(GenerateHandlers::new()).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    // The second cycle saw the first cycle's assistant message.
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[1].messages.len(), 2);
    assert_eq!(session.message_count().await, 3);
    assert!(!session.is_generating());
}

#[tokio::test(start_paused = true)]
async fn timeout_aborts_transport_call() {
    let transport = ScriptedTransport::new();
    transport.with_delay(Duration::from_secs(30)).queue_text("late");
    let session = Session::new(transport).with_config(
        GenerationConfig::builder().timeout_ms(100).build(),
    );
    session.add_user_message("hi").await;

    let err = session.generate(GenerateHandlers::new()).await.unwrap_err();
    assert_eq!(err, TandemError::Timeout(100));
    assert_eq!(session.message_count().await, 1);
}

#[tokio::test]
async fn message_indexing_and_counts() {
    let session = Session::new(ScriptedTransport::new());
    for i in 0..4 {
        session.add_user_message(format!("u{i}")).await;
        session.add_assistant_message(format!("a{i}")).await;
    }

    let n = session.message_count().await as isize;
    assert_eq!(n, 8);
    assert_eq!(
        session.message_text(-1).await.unwrap(),
        session.message_text(n - 1).await.unwrap()
    );
    assert_eq!(session.message_text(-8).await.unwrap(), "u0");
    assert_eq!(
        session.message_text(8).await.unwrap_err(),
        TandemError::MessageNotFound { index: 8, len: 8 }
    );
    assert!(session.message_text(-9).await.is_err());
    assert_eq!(session.count_by_role(Role::User).await, 4);
    assert_eq!(session.last_index_of(Role::User).await, Some(6));

    session.clear_messages().await;
    assert_eq!(session.message_count().await, 0);
    assert!(session.message(0).await.is_err());
}

#[tokio::test]
async fn reset_respects_keep_config() {
    let transport = ScriptedTransport::new();
    let session = Session::new(transport)
        .with_config(GenerationConfig::builder().temperature(0.2).build())
        .with_tool(echo_tool(Arc::new(AtomicUsize::new(0))));
    session.add_user_message("hi").await;
    session.generate(GenerateHandlers::new()).await.unwrap();

    session.reset(true).await;
    assert_eq!(session.message_count().await, 0);
    assert_eq!(session.iteration_count().await, 0);
    assert!(session.last_response().await.is_none());
    assert_eq!(session.config().await.temperature, Some(0.2));
    assert!(session.find_tool_by_name("echo").await.is_some());

    session.reset(false).await;
    assert_eq!(session.config().await, GenerationConfig::default());
    assert_eq!(session.tool_count().await, 0);
}

#[tokio::test]
async fn tool_registration_round_trip() {
    let session = Session::new(ScriptedTransport::new());
    let calls = Arc::new(AtomicUsize::new(0));
    assert!(session.add_tool(echo_tool(Arc::clone(&calls))).await.is_none());
    assert!(session.add_tool(echo_tool(calls)).await.is_some());
    assert_eq!(session.tool_count().await, 1);
    assert!(session.remove_tool("echo").await.is_some());
    assert!(session.find_tool_by_name("echo").await.is_none());
}
