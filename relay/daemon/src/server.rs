//! Relay HTTP Surface
//!
//! One endpoint: `POST /api/chat` with a JSON-array conversation body.
//! The reply is either a raw byte stream of UTF-8 text fragments (no
//! content-length) or the provider's complete JSON body, depending on how
//! the relay is configured. Failures before any output produce a JSON
//! `{"error": ...}` body with a 500 status; failures mid-stream terminate
//! the body without retracting what was already sent.
//!
//! The daemon is stateless: each request is handled independently against
//! a shared, immutable relay handle.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use confab_core::{Conversation, ModelProvider, Relay, RelayReply, StreamFragment};

/// Build the daemon router
///
/// Permissive CORS so a browser caller can reach the endpoint directly.
pub fn router<P: ModelProvider + 'static>(relay: Relay<P>) -> Router {
    Router::new()
        .route("/api/chat", post(chat::<P>))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(relay))
}

/// The chat endpoint: relay one conversation
async fn chat<P: ModelProvider + 'static>(
    State(relay): State<Arc<Relay<P>>>,
    Json(conversation): Json<Conversation>,
) -> Response {
    debug!(messages = conversation.len(), "conversation received");

    match relay.handle(conversation).await {
        Ok(RelayReply::Stream(rx)) => stream_response(rx),
        Ok(RelayReply::Complete(body)) => Json(body).into_response(),
        Err(e) => {
            error!(error = %e, "relay request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Turn the fragment channel into a raw streaming body
///
/// `Complete` ends the body; `Error` aborts it mid-transfer, leaving
/// already-sent fragments with the caller.
fn stream_response(mut rx: tokio::sync::mpsc::Receiver<StreamFragment>) -> Response {
    let body_stream = async_stream::stream! {
        while let Some(fragment) = rx.recv().await {
            match fragment {
                StreamFragment::Text(text) => {
                    yield Ok::<Bytes, std::io::Error>(Bytes::from(text));
                }
                StreamFragment::Complete => return,
                StreamFragment::Error(e) => {
                    error!(error = %e, "stream aborted mid-transfer");
                    yield Err(std::io::Error::other(e));
                    return;
                }
            }
        }
    };

    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(body_stream),
    )
        .into_response()
}
