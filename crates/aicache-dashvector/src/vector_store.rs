use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aicache_core::{
    AiCacheError, ProviderBackend, ProviderRequest, ProviderResponse, QueryResult, ScoreOrder,
    ServiceTarget, VectorStoreProvider,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Default acceptance threshold on DashVector scores.
pub const DASHVECTOR_THRESHOLD: f64 = 2000.0;

const AUTH_HEADER: &str = "dashvector-auth-token";

// ---------------------------------------------------------------------------
// DashVectorConfig
// ---------------------------------------------------------------------------

/// Configuration for a DashVector collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashVectorConfig {
    /// Collection API token, sent with every call.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub service_name: String,
    /// Service port (default: `443`).
    #[serde(default = "default_port")]
    pub service_port: u16,
    /// Cluster endpoint domain, e.g. `vrs-cn-xxx.dashvector.cn-hangzhou.aliyuncs.com`.
    #[serde(default)]
    pub service_domain: String,
    #[serde(default, rename = "collectionID")]
    pub collection_id: String,
    #[serde(default = "default_top_k", rename = "topK")]
    pub top_k: usize,
    #[serde(default = "default_timeout_ms", rename = "timeout")]
    pub timeout_ms: u64,
    /// Overrides [`DASHVECTOR_THRESHOLD`].
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
}

fn default_port() -> u16 {
    443
}

fn default_top_k() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl DashVectorConfig {
    pub fn new(
        api_key: impl Into<String>,
        service_name: impl Into<String>,
        service_domain: impl Into<String>,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            service_name: service_name.into(),
            service_port: default_port(),
            service_domain: service_domain.into(),
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
        let required = [
            ("apiKey", &self.api_key),
            ("collectionID", &self.collection_id),
            ("serviceName", &self.service_name),
            ("serviceDomain", &self.service_domain),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(AiCacheError::Config(format!(
                    "[DashVector] {name} is required"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    topk: usize,
    include_vector: bool,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    docs: Vec<Doc<'a>>,
}

#[derive(Debug, Serialize)]
struct Doc<'a> {
    id: String,
    vector: &'a [f32],
    fields: HashMap<&'static str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct DashVectorResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    output: Option<Vec<QueryOutput>>,
}

#[derive(Debug, Deserialize)]
struct QueryOutput {
    #[serde(default)]
    fields: HashMap<String, Value>,
    score: f64,
}

// ---------------------------------------------------------------------------
// DashVectorStore
// ---------------------------------------------------------------------------

/// A [`VectorStoreProvider`] backed by a DashVector collection.
pub struct DashVectorStore {
    config: DashVectorConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl DashVectorStore {
    /// Create a new store, failing fast on missing configuration.
    pub fn new(
        config: DashVectorConfig,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Self, AiCacheError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &DashVectorConfig {
        &self.config
    }

    fn request(&self, path: &str, body: Value) -> ProviderRequest {
        ProviderRequest {
            url: format!(
                "{}/v1/collections/{}/{path}",
                self.config.target().base_url(),
                self.config.collection_id
            ),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (AUTH_HEADER.to_string(), self.config.api_key.clone()),
            ],
            body,
            timeout: Some(Duration::from_millis(self.config.timeout_ms)),
        }
    }
}

/// Check HTTP status and the body's own `code`, returning the decoded body.
fn decode(op: &str, response: ProviderResponse) -> Result<DashVectorResponse, AiCacheError> {
    if !response.is_success() {
        return Err(AiCacheError::VectorStore(format!(
            "DashVector {op} error (HTTP {}): {}",
            response.status, response.body
        )));
    }
    let decoded: DashVectorResponse = serde_json::from_value(response.body).map_err(|e| {
        AiCacheError::VectorStore(format!("failed to parse DashVector {op} response: {e}"))
    })?;
    if decoded.code != 0 {
        return Err(AiCacheError::VectorStore(format!(
            "DashVector {op} error (code {}): {}",
            decoded.code, decoded.message
        )));
    }
    Ok(decoded)
}

/// Stable document id for a cache key: hex SHA-256, which fits the 64-char id limit.
fn doc_id(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn into_results(outputs: Vec<QueryOutput>) -> Vec<QueryResult> {
    outputs
        .into_iter()
        .filter_map(|mut output| {
            let answer = match output.fields.remove("answer") {
                Some(Value::String(answer)) => answer,
                _ => return None,
            };
            let text = match output.fields.remove("query") {
                Some(Value::String(query)) => Some(query),
                _ => None,
            };
            Some(QueryResult {
                answer,
                score: output.score,
                text,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// VectorStoreProvider implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl VectorStoreProvider for DashVectorStore {
    fn provider_type(&self) -> &'static str {
        "dashvector"
    }

    fn similarity_threshold(&self) -> f64 {
        self.config
            .similarity_threshold
            .unwrap_or(DASHVECTOR_THRESHOLD)
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::LowerIsCloser
    }

    async fn query_nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryResult>, AiCacheError> {
        let body = serde_json::to_value(QueryRequest {
            vector: embedding,
            topk: top_k,
            include_vector: false,
        })
        .map_err(|e| AiCacheError::VectorStore(format!("failed to encode query: {e}")))?;

        let response = self.backend.send(self.request("query", body)).await?;
        let decoded = decode("query", response)?;
        let results = into_results(decoded.output.unwrap_or_default());
        tracing::debug!(candidates = results.len(), "dashvector query finished");
        Ok(results)
    }

    async fn upload(
        &self,
        embedding: &[f32],
        key: &str,
        answer: &str,
    ) -> Result<(), AiCacheError> {
        let doc = Doc {
            id: doc_id(key),
            vector: embedding,
            fields: HashMap::from([("query", key), ("answer", answer)]),
        };
        let body = serde_json::to_value(UpsertRequest { docs: vec![doc] })
            .map_err(|e| AiCacheError::VectorStore(format!("failed to encode docs: {e}")))?;

        let response = self.backend.send(self.request("docs/upsert", body)).await?;
        decode("upsert", response)?;
        Ok(())
    }
}
