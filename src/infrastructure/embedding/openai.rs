//! OpenAI-compatible embedding provider

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::HttpClientTrait;
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::DomainError;

const DEFAULT_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embedding provider for any endpoint speaking the OpenAI embeddings format
///
/// The configured URL is the full endpoint; the request is
/// `{"model", "input"}` and the vector is read from `data[0].embedding`.
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    url: String,
    model: String,
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    /// Create a provider for the public OpenAI endpoint
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_endpoint(client, api_key, DEFAULT_EMBEDDINGS_URL, DEFAULT_EMBEDDING_MODEL)
    }

    /// Create a provider for a custom endpoint and model
    pub fn with_endpoint(
        client: C,
        api_key: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());

        Self {
            client,
            auth_header,
            url: url.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<Vec<f32>, DomainError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::embedding("openai", format!("Failed to parse embedding response: {}", e))
        })?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();

        if vector.is_empty() {
            return Err(DomainError::embedding("openai", "Response contained no embedding"));
        }

        Ok(vector)
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        debug!(model = %self.model, chars = text.len(), "Requesting embedding");

        let response = self.client.post_json(&self.url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}
