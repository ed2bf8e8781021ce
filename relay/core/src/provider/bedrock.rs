//! Bedrock Provider Implementation
//!
//! Model provider speaking the Bedrock-runtime REST surface:
//!
//! - `POST /model/{model_id}/invoke` - complete response as one JSON body
//! - `POST /model/{model_id}/invoke-with-response-stream` - incremental
//!   chunk stream
//!
//! The single-shot path uses the messages-API body shape; the streaming
//! path uses the Claude text-completion shape, formatting the outbound
//! list into alternating `Human:`/`Assistant:` turns. Streamed chunk units
//! arrive newline-delimited, each either an envelope object carrying
//! base64 payload bytes or a bare payload unit; classification into
//! [`RawChunk`] happens here, normalization in [`super::chunk`].
//!
//! Credentials travel as a bearer token; request signing is a deployment
//! concern outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use super::chunk::RawChunk;
use super::traits::{ChunkEvent, ModelProvider, ModelRequest};
use crate::error::ProviderError;
use crate::messages::{Message, Role};

/// Channel capacity for the chunk stream
const CHUNK_CHANNEL_CAPACITY: usize = 100;

/// Bedrock connection configuration
#[derive(Clone, Debug)]
pub struct BedrockConfig {
    /// Provider region
    pub region: String,
    /// Endpoint override; defaults to the regional bedrock-runtime host
    pub endpoint: Option<String>,
    /// Bearer credentials, if required by the deployment
    pub bearer_token: Option<String>,
    /// Model id for the streaming path
    pub stream_model: String,
    /// Model id for the single-shot path
    pub invoke_model: String,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            endpoint: None,
            bearer_token: None,
            stream_model: "anthropic.claude-v2".to_string(),
            invoke_model: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
        }
    }
}

impl BedrockConfig {
    /// Create configuration from environment variables
    ///
    /// - `CONFAB_REGION` (or `AWS_REGION`): provider region
    /// - `CONFAB_BEDROCK_ENDPOINT`: endpoint override
    /// - `AWS_BEARER_TOKEN_BEDROCK`: bearer credentials
    /// - `CONFAB_STREAM_MODEL`, `CONFAB_INVOKE_MODEL`: model ids
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            region: std::env::var("CONFAB_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .unwrap_or(defaults.region),
            endpoint: std::env::var("CONFAB_BEDROCK_ENDPOINT").ok(),
            bearer_token: std::env::var("AWS_BEARER_TOKEN_BEDROCK").ok(),
            stream_model: std::env::var("CONFAB_STREAM_MODEL").unwrap_or(defaults.stream_model),
            invoke_model: std::env::var("CONFAB_INVOKE_MODEL").unwrap_or(defaults.invoke_model),
        }
    }
}

/// Bedrock provider client
#[derive(Clone)]
pub struct BedrockProvider {
    config: BedrockConfig,
    http_client: reqwest::Client,
}

impl BedrockProvider {
    /// Create a new provider from configuration
    #[must_use]
    pub fn new(config: BedrockConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create a provider from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(BedrockConfig::from_env())
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        self.config.endpoint.clone().unwrap_or_else(|| {
            format!("https://bedrock-runtime.{}.amazonaws.com", self.config.region)
        })
    }

    /// Get the single-shot invocation URL
    fn invoke_url(&self) -> String {
        format!("{}/model/{}/invoke", self.base_url(), self.config.invoke_model)
    }

    /// Get the streaming invocation URL
    fn stream_url(&self) -> String {
        format!(
            "{}/model/{}/invoke-with-response-stream",
            self.base_url(),
            self.config.stream_model
        )
    }

    /// Attach headers shared by both paths
    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(ref token) = self.config.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Build the messages-API body for the single-shot path
    ///
    /// System-role entries become leading user turns; user and assistant
    /// roles pass through.
    fn messages_body(&self, request: &ModelRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System | Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect();

        serde_json::json!({
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": request.params.max_tokens,
            "messages": messages,
            "temperature": request.params.temperature,
            "top_k": request.params.top_k,
            "top_p": request.params.top_p,
        })
    }

    /// Build the text-completion body for the streaming path
    fn prompt_body(&self, request: &ModelRequest) -> serde_json::Value {
        serde_json::json!({
            "prompt": format_prompt(&request.messages),
            "max_tokens_to_sample": request.params.max_tokens,
            "temperature": request.params.temperature,
            "top_k": request.params.top_k,
            "top_p": request.params.top_p,
        })
    }
}

/// Format the outbound list as alternating completion turns
///
/// System-role entries become `Human:` turns with a `System: ` content
/// prefix, user entries become `Human:` turns, assistant entries keep the
/// `Assistant:` speaker. A trailing `Assistant:` cues the model to answer.
fn format_prompt(messages: &[Message]) -> String {
    let turns: Vec<String> = messages
        .iter()
        .map(|m| match m.role {
            Role::System => format!("Human: System: {}", m.content),
            Role::User => format!("Human: {}", m.content),
            Role::Assistant => format!("Assistant: {}", m.content),
        })
        .collect();

    format!("{}\n\nAssistant:", turns.join("\n\n"))
}

/// The envelope a streamed chunk unit may be nested under
#[derive(Debug, serde::Deserialize)]
struct ChunkEnvelope {
    chunk: ChunkEnvelopeInner,
}

#[derive(Debug, serde::Deserialize)]
struct ChunkEnvelopeInner {
    bytes: String,
}

/// Classify one wire unit into a [`RawChunk`]
///
/// An envelope object with a decodable base64 payload becomes `Wrapped`;
/// everything else stays a raw binary unit for the normalizer to decode.
fn classify_unit(unit: &[u8]) -> RawChunk {
    if let Ok(envelope) = serde_json::from_slice::<ChunkEnvelope>(unit) {
        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&envelope.chunk.bytes) {
            return RawChunk::Wrapped { bytes };
        }
    }
    RawChunk::Bytes(unit.to_vec())
}

#[async_trait]
impl ModelProvider for BedrockProvider {
    fn name(&self) -> &str {
        "Bedrock"
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<serde_json::Value, ProviderError> {
        let body = self.messages_body(request);
        let response = self.request(&self.invoke_url()).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let body: serde_json::Value = response.json().await?;
        Ok(body)
    }

    async fn open_stream(
        &self,
        request: &ModelRequest,
    ) -> Result<mpsc::Receiver<ChunkEvent>, ProviderError> {
        let body = self.prompt_body(request);
        let response = self.request(&self.stream_url()).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let mut stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(piece) = stream.next().await {
                match piece {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);

                        // Parse newline-delimited chunk units
                        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                            let unit: Vec<u8> = buffer.drain(..=pos).collect();
                            let unit = unit[..unit.len() - 1].trim_ascii();
                            if unit.is_empty() {
                                continue;
                            }
                            if tx.send(ChunkEvent::Chunk(classify_unit(unit))).await.is_err() {
                                // Receiver dropped: stop reading and let the
                                // response drop, releasing the connection
                                debug!("chunk receiver dropped, aborting provider stream");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(ChunkEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }

            // Stream ended; flush any unterminated trailing unit
            let tail = buffer.trim_ascii();
            if !tail.is_empty()
                && tx
                    .send(ChunkEvent::Chunk(classify_unit(tail)))
                    .await
                    .is_err()
            {
                return;
            }

            let _ = tx.send(ChunkEvent::Complete).await;
        });

        Ok(rx)
    }
}
