//! Chat Completions contract tests.
//!
//! These tests run the client against a mock server and verify:
//! - the request body and headers match the API format
//! - responses and stream events are parsed correctly
//! - error statuses map to `CellGptError` variants
//! - a missing key never reaches the network

use cellgpt::CellGptError;
use cellgpt::openai::{
    CallbackInvocation, ChatClient, ChatRequest, ClientConfig, ConversationTurn,
    GenerationOptions, ModelName, StreamOutcome,
};
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETIONS: &str = "/v1/chat/completions";

fn client_for(server: &MockServer) -> ChatClient {
    match ChatClient::new(ClientConfig::default().with_base_url(server.uri())) {
        Ok(c) => c,
        Err(e) => unreachable!("mock client should build: {e}"),
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4-0613",
        "usage": {"prompt_tokens": 9, "completion_tokens": 1, "total_tokens": 10},
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn sse(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|p| format!("data: {p}\n\n"))
        .collect()
}

fn delta(content: &str) -> String {
    json!({"choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]})
        .to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Request format
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_includes_messages_options_and_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello!"},
                {"role": "user", "content": "What is 2+2?"}
            ],
            "max_tokens": 16,
            "temperature": 0.5,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("4")))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::new("You are terse.")
        .with_model(ModelName::Gpt4o)
        .with_history(vec![ConversationTurn::new("Hi", "Hello!")])
        .with_prompt("What is 2+2?")
        .with_options(GenerationOptions::new().with_max_tokens(16).with_temperature(0.5));

    let result = client_for(&server).complete("sk-test", &request).await;
    assert_eq!(result.unwrap_or_default(), "4");
}

#[tokio::test]
async fn empty_prompt_sends_history_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_partial_json(json!({
            "messages": [{"role": "system", "content": "sys"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::new("sys").with_prompt("");
    let result = client_for(&server).complete("sk-test", &request).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn complete_is_idempotent_against_fixed_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("same")))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = ChatRequest::new("sys").with_prompt("again");
    let first = client.complete("sk-test", &request).await.unwrap_or_default();
    let second = client.complete("sk-test", &request).await.unwrap_or_default();
    assert_eq!(first, "same");
    assert_eq!(first, second);
}

// ────────────────────────────────────────────────────────────────────────────
// Auth
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_key_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("x")))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = ChatRequest::new("sys").with_prompt("hi");

    let result = client.complete("   ", &request).await;
    assert!(matches!(result, Err(CellGptError::AuthError(_))));

    let mut invocation = CallbackInvocation::new(|_: &str| {});
    let result = client.stream_complete("", &request, &mut invocation).await;
    assert!(matches!(result, Err(CellGptError::AuthError(_))));
    assert!(invocation.error().is_some());
}

// ────────────────────────────────────────────────────────────────────────────
// Error mapping
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_maps_to_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit exceeded", "type": "rate_limit_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::new("sys").with_prompt("hi");
    match client_for(&server).complete("sk-test", &request).await {
        Err(CellGptError::RequestError { status, message }) => {
            assert_eq!(status, 429);
            assert_eq!(message, "Rate limit exceeded");
        }
        other => unreachable!("expected RequestError, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_error_status_maps_to_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let request = ChatRequest::new("sys").with_prompt("hi");
    let mut invocation = CallbackInvocation::new(|_: &str| {});
    let result = client_for(&server)
        .stream_complete("sk-wrong", &request, &mut invocation)
        .await;
    assert!(matches!(result, Err(CellGptError::RequestError { status: 401, .. })));
    assert!(invocation.error().is_some_and(|e| e.contains("bad key")));
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let request = ChatRequest::new("sys").with_prompt("hi");
    let result = client_for(&server).complete("sk-test", &request).await;
    assert!(matches!(result, Err(CellGptError::ParseError(_))));
}

#[tokio::test]
async fn empty_choices_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x", "model": "gpt-4", "choices": []
        })))
        .mount(&server)
        .await;

    let request = ChatRequest::new("sys").with_prompt("hi");
    let result = client_for(&server).complete("sk-test", &request).await;
    assert!(matches!(result, Err(CellGptError::ParseError(_))));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("late"))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::default()
        .with_base_url(server.uri())
        .with_request_timeout(Some(std::time::Duration::from_millis(100)));
    let client = match ChatClient::new(config) {
        Ok(c) => c,
        Err(e) => unreachable!("client should build: {e}"),
    };
    let request = ChatRequest::new("sys").with_prompt("hi");
    let result = client.complete("sk-test", &request).await;
    assert!(matches!(result, Err(CellGptError::TimeoutError(_))));
}

// ────────────────────────────────────────────────────────────────────────────
// Streaming
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_publishes_accumulated_text() {
    let server = MockServer::start().await;

    let body = sse(&[&delta("Hel"), &delta("lo"), "[DONE]"]);
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut published = Vec::new();
    let outcome = {
        let mut invocation = CallbackInvocation::new(|v: &str| published.push(v.to_string()));
        let request = ChatRequest::new("sys").with_prompt("hi");
        client_for(&server)
            .stream_complete("sk-test", &request, &mut invocation)
            .await
    };

    assert_eq!(published, ["Hel", "Hello"]);
    assert!(matches!(outcome, Ok(StreamOutcome::Completed(ref t)) if t == "Hello"));
}

#[tokio::test]
async fn stream_ignores_events_after_done() {
    let server = MockServer::start().await;

    let body = sse(&[&delta("a"), "[DONE]", &delta("never")]);
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let request = ChatRequest::new("sys").with_prompt("hi");
    let tokens = client_for(&server)
        .stream_tokens("sk-test", &request, CancellationToken::new())
        .await;
    let collected: Vec<String> = match tokens {
        Ok(s) => s.filter_map(|t| async move { t.ok() }).collect().await,
        Err(e) => unreachable!("stream should open: {e}"),
    };
    assert_eq!(collected, ["a"]);
}

#[tokio::test]
async fn stream_malformed_event_fails_after_earlier_tokens() {
    let server = MockServer::start().await;

    let body = sse(&[&delta("ok"), "{not json"]);
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut published = Vec::new();
    let (result, error) = {
        let mut invocation = CallbackInvocation::new(|v: &str| published.push(v.to_string()));
        let request = ChatRequest::new("sys").with_prompt("hi");
        let result = client_for(&server)
            .stream_complete("sk-test", &request, &mut invocation)
            .await;
        (result, invocation.error().map(str::to_string))
    };

    assert_eq!(published, ["ok"]);
    assert!(matches!(result, Err(CellGptError::ParseError(_))));
    assert!(error.is_some_and(|e| e.starts_with("[PARSE_FAILED]")));
}

#[tokio::test]
async fn stream_cancelled_before_start_publishes_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse(&[&delta("x"), "[DONE]"])))
        .expect(0)
        .mount(&server)
        .await;

    let mut published = Vec::new();
    let outcome = {
        let mut invocation = CallbackInvocation::new(|v: &str| published.push(v.to_string()));
        invocation.cancel_handle().cancel();
        let request = ChatRequest::new("sys").with_prompt("hi");
        client_for(&server)
            .stream_complete("sk-test", &request, &mut invocation)
            .await
    };

    assert!(published.is_empty());
    assert!(matches!(outcome, Ok(StreamOutcome::Cancelled(ref t)) if t.is_empty()));
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn stream_cancelled_while_awaiting_headers_returns_promptly() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse(&[&delta("late"), "[DONE]"]))
                .set_delay(std::time::Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let mut invocation = CallbackInvocation::new(|_: &str| {});
    let cancel = invocation.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let request = ChatRequest::new("sys").with_prompt("hi");
    let outcome = client_for(&server)
        .stream_complete("sk-test", &request, &mut invocation)
        .await;

    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert!(matches!(outcome, Ok(StreamOutcome::Cancelled(ref t)) if t.is_empty()));
    assert!(invocation.error().is_none());
}
