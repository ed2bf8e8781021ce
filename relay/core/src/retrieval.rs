//! Context Retrieval
//!
//! Optional retrieval-augmented generation: embed the latest user message,
//! query a vector index for the nearest stored snippets, and fold their
//! text into the outbound request.
//!
//! Top-3 unconditionally: no re-ranking, no deduplication, no relevance
//! threshold. A failure in either the embedding call or the index lookup
//! propagates as a request failure; there is no fallback to an unaugmented
//! prompt.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::RetrievalError;

/// Number of nearest neighbours requested from the index
const TOP_K: u32 = 3;

/// Retrieval configuration
#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    /// Provider region for the embedding endpoint
    pub region: String,
    /// Embedding endpoint override
    pub endpoint: Option<String>,
    /// Bearer credentials for the embedding endpoint
    pub bearer_token: Option<String>,
    /// Embedding model id
    pub embed_model: String,
    /// Vector index host; retrieval is disabled when absent
    pub index_host: Option<String>,
    /// Vector index API key
    pub index_api_key: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            endpoint: None,
            bearer_token: None,
            embed_model: "amazon.titan-embed-text-v1".to_string(),
            index_host: None,
            index_api_key: None,
        }
    }
}

impl RetrievalConfig {
    /// Create configuration from environment variables
    ///
    /// - `CONFAB_REGION` (or `AWS_REGION`), `CONFAB_BEDROCK_ENDPOINT`,
    ///   `AWS_BEARER_TOKEN_BEDROCK`: shared with the model provider
    /// - `CONFAB_EMBED_MODEL`: embedding model id
    /// - `CONFAB_INDEX_HOST`: vector index base URL; unset disables
    ///   augmentation
    /// - `CONFAB_INDEX_API_KEY`: vector index credentials
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            region: std::env::var("CONFAB_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .unwrap_or(defaults.region),
            endpoint: std::env::var("CONFAB_BEDROCK_ENDPOINT").ok(),
            bearer_token: std::env::var("AWS_BEARER_TOKEN_BEDROCK").ok(),
            embed_model: std::env::var("CONFAB_EMBED_MODEL").unwrap_or(defaults.embed_model),
            index_host: std::env::var("CONFAB_INDEX_HOST").ok(),
            index_api_key: std::env::var("CONFAB_INDEX_API_KEY").ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    metadata: Option<MatchMetadata>,
}

#[derive(Debug, Deserialize)]
struct MatchMetadata {
    text: Option<String>,
}

/// Retrieves context snippets for a query via embedding + vector search
#[derive(Clone)]
pub struct ContextRetriever {
    config: RetrievalConfig,
    index_host: String,
    http_client: reqwest::Client,
}

impl ContextRetriever {
    /// Create a retriever from configuration
    ///
    /// Returns `None` when no vector index host is configured, which
    /// disables context augmentation.
    #[must_use]
    pub fn new(config: RetrievalConfig) -> Option<Self> {
        let index_host = config.index_host.clone()?;
        Some(Self {
            config,
            index_host,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to create HTTP client"),
        })
    }

    /// Create a retriever from environment variables
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::new(RetrievalConfig::from_env())
    }

    fn embed_url(&self) -> String {
        let base = self.config.endpoint.clone().unwrap_or_else(|| {
            format!("https://bedrock-runtime.{}.amazonaws.com", self.config.region)
        });
        format!("{}/model/{}/invoke", base, self.config.embed_model)
    }

    /// Embed a query into a fixed-dimension vector
    async fn embed(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut builder = self
            .http_client
            .post(self.embed_url())
            .json(&serde_json::json!({ "inputText": query }));
        if let Some(ref token) = self.config.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!("{status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        Ok(parsed.embedding)
    }

    /// Retrieve the context string for a query
    ///
    /// The top-3 matched snippets' text fields, joined by newline in the
    /// index's returned order.
    pub async fn retrieve(&self, query: &str) -> Result<String, RetrievalError> {
        let vector = self.embed(query).await?;
        debug!(dimensions = vector.len(), "embedded retrieval query");

        let mut builder = self
            .http_client
            .post(format!("{}/query", self.index_host))
            .json(&serde_json::json!({
                "vector": vector,
                "topK": TOP_K,
                "includeMetadata": true,
            }));
        if let Some(ref key) = self.config.index_api_key {
            builder = builder.header("Api-Key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Index(format!("{status}: {body}")));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        let context = parsed
            .matches
            .into_iter()
            .filter_map(|m| m.metadata.and_then(|meta| meta.text))
            .collect::<Vec<String>>()
            .join("\n");
        Ok(context)
    }
}
