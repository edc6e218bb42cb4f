//! Drives `GeminiInsightAdapter` against a scripted local HTTP server.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    Router,
};
use insight_api::adapters::GeminiInsightAdapter;
use insight_core::ports::{InsightGenerationService, PortError};
use insight_core::prompt::NO_INSIGHT_SENTINEL;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MODEL: &str = "test-model";

struct Captured {
    path: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Default)]
struct MockGemini {
    script: Mutex<VecDeque<(StatusCode, String)>>,
    captured: Mutex<Vec<Captured>>,
}

impl MockGemini {
    fn calls(&self) -> usize {
        self.captured.lock().unwrap().len()
    }
}

async fn handle(
    State(mock): State<Arc<MockGemini>>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    mock.captured.lock().unwrap().push(Captured {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });
    mock.script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "script exhausted".to_string()))
}

/// Serves `responses` in order and returns the mock plus its base URL.
async fn serve(responses: Vec<(StatusCode, &str)>) -> (Arc<MockGemini>, String) {
    let mock = Arc::new(MockGemini::default());
    mock.script
        .lock()
        .unwrap()
        .extend(responses.into_iter().map(|(s, b)| (s, b.to_string())));

    let app = Router::new().fallback(handle).with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (mock, format!("http://{}", addr))
}

fn adapter(base_url: &str, max_retries: u32) -> GeminiInsightAdapter {
    GeminiInsightAdapter::new(
        "secret-key".to_string(),
        base_url,
        MODEL,
        Duration::from_secs(5),
    )
    .unwrap()
    .with_retry(max_retries, Duration::from_millis(10))
}

const SKY_REPLY: &str =
    r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"The sky is blue."}]}}]}"#;

#[tokio::test]
async fn sends_prompt_and_key_and_returns_text() {
    let (mock, base_url) = serve(vec![(StatusCode::OK, SKY_REPLY)]).await;

    let reply = adapter(&base_url, 0).generate("What color is the sky?").await.unwrap();

    assert_eq!(reply, "The sky is blue.");
    let captured = mock.captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(
        captured[0].path,
        format!("/v1beta/models/{}:generateContent", MODEL)
    );
    assert_eq!(captured[0].api_key.as_deref(), Some("secret-key"));
    assert_eq!(
        captured[0].body["contents"][0]["parts"][0]["text"],
        "What color is the sky?"
    );
    assert_eq!(captured[0].body["contents"][0]["role"], "user");
}

#[tokio::test]
async fn transient_server_error_is_retried() {
    let (mock, base_url) = serve(vec![
        (StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
        (StatusCode::OK, SKY_REPLY),
    ])
    .await;

    let reply = adapter(&base_url, 2).generate("prompt").await.unwrap();

    assert_eq!(reply, "The sky is blue.");
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn rate_limiting_is_retried() {
    let (mock, base_url) = serve(vec![
        (StatusCode::TOO_MANY_REQUESTS, "slow down"),
        (StatusCode::OK, SKY_REPLY),
    ])
    .await;

    adapter(&base_url, 1).generate("prompt").await.unwrap();

    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let (mock, base_url) = serve(vec![
        (StatusCode::BAD_REQUEST, "API key not valid"),
        (StatusCode::OK, SKY_REPLY),
    ])
    .await;

    let err = adapter(&base_url, 3).generate("prompt").await.unwrap_err();

    assert_eq!(mock.calls(), 1);
    match err {
        PortError::Unexpected(message) => assert!(message.contains("API key not valid")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn retries_are_bounded() {
    let (mock, base_url) = serve(vec![
        (StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        (StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        (StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        (StatusCode::INTERNAL_SERVER_ERROR, "boom"),
    ])
    .await;

    let err = adapter(&base_url, 2).generate("prompt").await.unwrap_err();

    assert!(matches!(err, PortError::Unexpected(_)));
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn empty_candidates_yield_the_sentinel() {
    let (_mock, base_url) = serve(vec![(StatusCode::OK, r#"{"candidates":[]}"#)]).await;

    let reply = adapter(&base_url, 0).generate("prompt").await.unwrap();

    assert_eq!(reply, NO_INSIGHT_SENTINEL);
}

#[tokio::test]
async fn malformed_body_is_an_error() {
    let (mock, base_url) = serve(vec![
        (StatusCode::OK, "not json"),
        (StatusCode::OK, SKY_REPLY),
    ])
    .await;

    let err = adapter(&base_url, 2).generate("prompt").await.unwrap_err();

    assert!(matches!(err, PortError::Unexpected(_)));
    assert_eq!(mock.calls(), 1);
}
