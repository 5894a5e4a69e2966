use std::sync::Arc;
use std::time::Duration;

use aicache_core::{AiCacheError, ProviderBackend, ProviderRequest, ProviderResponse};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{default_timeout_ms, to_vector, Embeddings};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiEmbeddingsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms", rename = "timeout")]
    pub timeout_ms: u64,
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl OpenAiEmbeddingsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn validate(&self) -> Result<(), AiCacheError> {
        if self.api_key.is_empty() {
            return Err(AiCacheError::Config("[OpenAI] apiKey is required".to_string()));
        }
        if self.model.is_empty() {
            return Err(AiCacheError::Config("[OpenAI] model is required".to_string()));
        }
        Ok(())
    }
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    config: OpenAiEmbeddingsConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl OpenAiEmbeddings {
    pub fn new(
        config: OpenAiEmbeddingsConfig,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Self, AiCacheError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    fn build_request(&self, text: &str) -> ProviderRequest {
        ProviderRequest {
            url: format!("{}/embeddings", self.config.base_url.trim_end_matches('/')),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.api_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: json!({
                "model": self.config.model,
                "input": [text],
            }),
            timeout: Some(Duration::from_millis(self.config.timeout_ms)),
        }
    }

    fn parse_response(&self, response: &ProviderResponse) -> Result<Vec<f32>, AiCacheError> {
        if !response.is_success() {
            return Err(AiCacheError::Embedding(format!(
                "OpenAI API error ({}): {}",
                response.status, response.body
            )));
        }

        let values = response.body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| {
                AiCacheError::Embedding("missing 'data[0].embedding' in response".to_string())
            })?;
        to_vector(values)
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AiCacheError> {
        let response = self.backend.send(self.build_request(text)).await?;
        self.parse_response(&response)
    }
}
