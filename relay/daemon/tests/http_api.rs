//! HTTP surface tests
//!
//! Drive the router directly with `tower::ServiceExt::oneshot`; the relay
//! behind it runs against a scripted provider.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use confab_core::{
    ChunkEvent, ModelProvider, ModelRequest, ProviderError, RawChunk, Relay, RelayConfig,
};
use confab_daemon::router;

/// Scripted provider for exercising the HTTP layer
#[derive(Clone, Default)]
struct MockProvider {
    events: Arc<Mutex<Vec<ChunkEvent>>>,
    body: serde_json::Value,
    fail: bool,
}

impl MockProvider {
    fn with_events(events: Vec<ChunkEvent>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, _request: &ModelRequest) -> Result<serde_json::Value, ProviderError> {
        if self.fail {
            return Err(ProviderError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.body.clone())
    }

    async fn open_stream(
        &self,
        _request: &ModelRequest,
    ) -> Result<mpsc::Receiver<ChunkEvent>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let events: Vec<ChunkEvent> = std::mem::take(&mut *self.events.lock().unwrap());
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

fn completion_chunk(text: &str) -> ChunkEvent {
    ChunkEvent::Chunk(RawChunk::Text(
        serde_json::json!({ "completion": text }).to_string(),
    ))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const VALID_BODY: &str = r#"[{"role":"user","content":"hi"}]"#;

#[tokio::test]
async fn test_streaming_reply() {
    let provider = MockProvider::with_events(vec![
        completion_chunk("Hel"),
        completion_chunk("lo!"),
        ChunkEvent::Complete,
    ]);
    let app = router(Relay::new(provider, RelayConfig::default()));

    let response = app.oneshot(chat_request(VALID_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert!(
        response.headers().get(header::CONTENT_LENGTH).is_none(),
        "streamed reply must not carry a content-length"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Hello!");
}

#[tokio::test]
async fn test_single_shot_reply() {
    let body = serde_json::json!({
        "content": [{ "type": "text", "text": "hello" }],
    });
    let provider = MockProvider {
        body: body.clone(),
        ..Default::default()
    };
    let app = router(Relay::new(
        provider,
        RelayConfig {
            streaming: false,
            ..Default::default()
        },
    ));

    let response = app.oneshot(chat_request(VALID_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let forwarded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(forwarded, body);
}

#[tokio::test]
async fn test_provider_failure_is_json_500() {
    let app = router(Relay::new(MockProvider::failing(), RelayConfig::default()));

    let response = app.oneshot(chat_request(VALID_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let app = router(Relay::new(MockProvider::default(), RelayConfig::default()));

    let response = app
        .oneshot(chat_request(r#"{"not":"an array"}"#))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_mid_stream_error_aborts_body() {
    let provider = MockProvider::with_events(vec![
        completion_chunk("partial "),
        ChunkEvent::Error("connection reset".to_string()),
    ]);
    let app = router(Relay::new(provider, RelayConfig::default()));

    let response = app.oneshot(chat_request(VALID_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The partial fragment arrives, then the body errors instead of
    // ending cleanly
    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap();
    assert_eq!(&first.into_data().unwrap()[..], b"partial ");

    let mut aborted = false;
    while let Some(frame) = body.frame().await {
        if frame.is_err() {
            aborted = true;
            break;
        }
    }
    assert!(aborted, "body should terminate with an error");
}
