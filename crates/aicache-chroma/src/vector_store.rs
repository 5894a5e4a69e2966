use std::sync::Arc;
use std::time::Duration;

use aicache_core::{
    AiCacheError, ProviderBackend, ProviderRequest, QueryResult, ScoreOrder, ServiceTarget,
    VectorStoreProvider,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Default acceptance threshold on Chroma distances.
pub const CHROMA_THRESHOLD: f64 = 1000.0;

// ---------------------------------------------------------------------------
// ChromaConfig
// ---------------------------------------------------------------------------

/// Configuration for a Chroma collection reached through a cluster service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromaConfig {
    /// Service name of the Chroma cluster.
    #[serde(default)]
    pub service_name: String,
    /// Service port (default: `8000`).
    #[serde(default = "default_port")]
    pub service_port: u16,
    /// Optional domain used as host instead of the service name.
    #[serde(default)]
    pub service_domain: String,
    /// Id of the collection holding cached answers.
    #[serde(default, rename = "collectionID")]
    pub collection_id: String,
    /// Number of candidates requested per query (default: `1`).
    #[serde(default = "default_top_k", rename = "topK")]
    pub top_k: usize,
    /// Per-call timeout in milliseconds (default: `10000`).
    #[serde(default = "default_timeout_ms", rename = "timeout")]
    pub timeout_ms: u64,
    /// Overrides [`CHROMA_THRESHOLD`].
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
}

fn default_port() -> u16 {
    8000
}

fn default_top_k() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl ChromaConfig {
    /// Create a new config for the given service and collection.
    pub fn new(service_name: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_port: default_port(),
            service_domain: String::new(),
            collection_id: collection_id.into(),
            top_k: default_top_k(),
            timeout_ms: default_timeout_ms(),
            similarity_threshold: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.service_port = port;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.service_domain = domain.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn target(&self) -> ServiceTarget {
        ServiceTarget::new(&self.service_name, self.service_port).with_domain(&self.service_domain)
    }

    pub fn validate(&self) -> Result<(), AiCacheError> {
        if self.collection_id.is_empty() {
            return Err(AiCacheError::Config(
                "[Chroma] collectionID is required".to_string(),
            ));
        }
        if self.service_name.is_empty() {
            return Err(AiCacheError::Config(
                "[Chroma] serviceName is required".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChromaVectorStore
// ---------------------------------------------------------------------------

/// A [`VectorStoreProvider`] backed by a Chroma collection.
pub struct ChromaVectorStore {
    config: ChromaConfig,
    backend: Arc<dyn ProviderBackend>,
}

/// Chroma query response: arrays of arrays, one outer entry per query embedding.
#[derive(Debug, Deserialize)]
struct ChromaQueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
}

impl ChromaVectorStore {
    /// Create a new store, failing fast on missing configuration.
    pub fn new(
        config: ChromaConfig,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Self, AiCacheError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &ChromaConfig {
        &self.config
    }

    /// Build the collection-scoped API URL.
    fn collection_url(&self, action: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{action}",
            self.config.target().base_url(),
            self.config.collection_id,
        )
    }

    fn request(&self, action: &str, body: serde_json::Value) -> ProviderRequest {
        ProviderRequest {
            url: self.collection_url(action),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
            timeout: Some(Duration::from_millis(self.config.timeout_ms)),
        }
    }
}

fn parse_query_response(body: serde_json::Value) -> Result<Vec<QueryResult>, AiCacheError> {
    let parsed: ChromaQueryResponse = serde_json::from_value(body).map_err(|e| {
        AiCacheError::VectorStore(format!("failed to parse Chroma query response: {e}"))
    })?;

    let Some(ids) = parsed.ids.into_iter().next() else {
        return Ok(Vec::new());
    };
    let distances = parsed
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let documents = parsed
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();

    if distances.len() < ids.len() || documents.len() < ids.len() {
        return Err(AiCacheError::VectorStore(format!(
            "Chroma returned {} ids but {} distances and {} documents",
            ids.len(),
            distances.len(),
            documents.len()
        )));
    }

    Ok(ids
        .into_iter()
        .zip(distances)
        .zip(documents)
        .filter_map(|((id, distance), document)| {
            document.map(|answer| QueryResult {
                answer,
                score: distance,
                text: Some(id),
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// VectorStoreProvider implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl VectorStoreProvider for ChromaVectorStore {
    fn provider_type(&self) -> &'static str {
        "chroma"
    }

    fn similarity_threshold(&self) -> f64 {
        self.config.similarity_threshold.unwrap_or(CHROMA_THRESHOLD)
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::LowerIsCloser
    }

    async fn query_nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryResult>, AiCacheError> {
        let body = json!({
            "query_embeddings": [embedding],
            "limit": top_k,
            "include": ["distances", "documents"],
        });

        let response = self.backend.send(self.request("query", body)).await?;
        if !response.is_success() {
            return Err(AiCacheError::VectorStore(format!(
                "Chroma query error (HTTP {}): {}",
                response.status, response.body
            )));
        }

        let results = parse_query_response(response.body)?;
        tracing::debug!(candidates = results.len(), "chroma query finished");
        Ok(results)
    }

    async fn upload(
        &self,
        embedding: &[f32],
        key: &str,
        answer: &str,
    ) -> Result<(), AiCacheError> {
        let body = json!({
            "embeddings": [embedding],
            "ids": [key],
            "documents": [answer],
        });

        let response = self.backend.send(self.request("add", body)).await?;
        if !response.is_success() {
            return Err(AiCacheError::VectorStore(format!(
                "Chroma add error (HTTP {}): {}",
                response.status, response.body
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_result_set() {
        let results = parse_query_response(json!({
            "ids": [[]],
            "distances": [[]],
            "documents": [[]],
        }))
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn parse_skips_null_documents() {
        let results = parse_query_response(json!({
            "ids": [["a", "b"]],
            "distances": [[0.1, 0.2]],
            "documents": [[null, "answer b"]],
        }))
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].answer, "answer b");
    }

    #[test]
    fn parse_rejects_ragged_arrays() {
        let err = parse_query_response(json!({
            "ids": [["a", "b"]],
            "distances": [[0.1]],
            "documents": [["x", "y"]],
        }))
        .unwrap_err();
        assert!(err.to_string().contains("2 ids"));
    }

    #[test]
    fn config_defaults() {
        let config = ChromaConfig::new("chroma.dns", "col-1");
        assert_eq!(config.service_port, 8000);
        assert_eq!(config.top_k, 1);
        assert_eq!(config.timeout_ms, 10_000);
        assert!(config.similarity_threshold.is_none());
    }
}
