use std::sync::Arc;
use std::time::Duration;

use aicache_core::{AiCacheError, ProviderBackend, ProviderRequest, ProviderResponse};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{default_timeout_ms, to_vector, Embeddings};

const EMBEDDING_PATH: &str = "/api/v1/services/embeddings/text-embedding/text-embedding";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashScopeEmbeddingsConfig {
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
    "text-embedding-v2".to_string()
}

fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com".to_string()
}

impl DashScopeEmbeddingsConfig {
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

    pub fn validate(&self) -> Result<(), AiCacheError> {
        if self.api_key.is_empty() {
            return Err(AiCacheError::Config(
                "[DashScope] apiKey is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Embeddings from the DashScope text-embedding service.
///
/// Queries are embedded with `text_type = "query"`, the asymmetric mode
/// DashScope recommends for short search inputs.
pub struct DashScopeEmbeddings {
    config: DashScopeEmbeddingsConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl DashScopeEmbeddings {
    pub fn new(
        config: DashScopeEmbeddingsConfig,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Self, AiCacheError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    fn build_request(&self, text: &str) -> ProviderRequest {
        ProviderRequest {
            url: format!(
                "{}{EMBEDDING_PATH}",
                self.config.base_url.trim_end_matches('/')
            ),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.api_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: json!({
                "model": self.config.model,
                "input": {"texts": [text]},
                "parameters": {"text_type": "query"},
            }),
            timeout: Some(Duration::from_millis(self.config.timeout_ms)),
        }
    }

    fn parse_response(&self, response: &ProviderResponse) -> Result<Vec<f32>, AiCacheError> {
        if !response.is_success() {
            let message = response.body["message"].as_str().unwrap_or("unknown error");
            return Err(AiCacheError::Embedding(format!(
                "DashScope API error ({}): {message}",
                response.status
            )));
        }

        let values = response.body["output"]["embeddings"][0]["embedding"]
            .as_array()
            .ok_or_else(|| {
                AiCacheError::Embedding(
                    "missing 'output.embeddings[0].embedding' in response".to_string(),
                )
            })?;
        to_vector(values)
    }
}

#[async_trait]
impl Embeddings for DashScopeEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AiCacheError> {
        let response = self.backend.send(self.build_request(text)).await?;
        self.parse_response(&response)
    }
}
