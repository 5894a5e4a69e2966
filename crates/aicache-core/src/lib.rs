//! Core contracts for the AiCache semantic response cache.
//!
//! Every external collaborator of the cache engine is reached through one of
//! three capabilities defined here:
//!
//! - [`Embeddings`] turns the cache key text into a vector.
//! - [`VectorStoreProvider`] runs nearest-neighbour queries over stored
//!   `(vector, answer)` pairs and accepts new ones.
//! - [`KvStore`] is the exact-match key-value store.
//!
//! Concrete backends live in their own crates and are selected at
//! configuration time; the engine depends only on these traits.

mod backend;
mod json_path;

pub use backend::{FakeBackend, HttpBackend, ProviderBackend, ProviderRequest, ProviderResponse};
pub use json_path::{value_to_text, JsonPath};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for the cache and its providers.
#[derive(Debug, Error)]
pub enum AiCacheError {
    #[error("config error: {0}")]
    Config(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("vector store error: {0}")]
    VectorStore(String),
    #[error("cache store error: {0}")]
    Cache(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("parsing error: {0}")]
    Parsing(String),
}

/// Coarse classification of [`AiCacheError`] used by the engine's absorb policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required setting is missing or invalid. Fatal at construction only.
    Config,
    /// An embedding, vector store, or key-value call failed or timed out.
    Provider,
    /// A body, frame, or field path could not be interpreted.
    Parse,
}

impl AiCacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AiCacheError::Config(_) => ErrorKind::Config,
            AiCacheError::Parsing(_) => ErrorKind::Parse,
            AiCacheError::Embedding(_)
            | AiCacheError::VectorStore(_)
            | AiCacheError::Cache(_)
            | AiCacheError::Transport(_)
            | AiCacheError::Timeout(_) => ErrorKind::Provider,
        }
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Turns query text into a fixed-length vector.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AiCacheError>;
}

// ---------------------------------------------------------------------------
// Vector store
// ---------------------------------------------------------------------------

/// One candidate returned by a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The stored answer for the matched entry.
    pub answer: String,
    /// Backend-defined score; see [`ScoreOrder`] for its direction.
    pub score: f64,
    /// The original query text stored alongside the answer, when the backend returns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Which direction of a backend's score means "more similar".
///
/// Distance metrics shrink as vectors converge while similarity metrics grow,
/// so every backend declares its own direction next to its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// Distances: `0.0` is an exact match.
    LowerIsCloser,
    /// Similarities: larger is closer (e.g. cosine).
    HigherIsCloser,
}

impl ScoreOrder {
    /// Whether `score` passes `threshold`. The boundary value itself is accepted.
    pub fn accepts(self, score: f64, threshold: f64) -> bool {
        match self {
            ScoreOrder::LowerIsCloser => score <= threshold,
            ScoreOrder::HigherIsCloser => score >= threshold,
        }
    }

    /// Whether score `a` is strictly closer than score `b`.
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            ScoreOrder::LowerIsCloser => a < b,
            ScoreOrder::HigherIsCloser => a > b,
        }
    }
}

/// Approximate nearest-neighbour search over stored `(vector, answer)` pairs.
///
/// Implementations validate their configuration at construction time and
/// report a missing field as [`AiCacheError::Config`].
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Short backend name used in logs.
    fn provider_type(&self) -> &'static str;

    /// Acceptance threshold for the best candidate, compared via [`score_order`](Self::score_order).
    fn similarity_threshold(&self) -> f64;

    /// Direction in which this backend's scores improve.
    fn score_order(&self) -> ScoreOrder;

    /// Return up to `top_k` candidates ordered best first.
    async fn query_nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryResult>, AiCacheError>;

    /// Store `(embedding, key, answer)` for future lookups.
    async fn upload(&self, embedding: &[f32], key: &str, answer: &str)
        -> Result<(), AiCacheError>;
}

// ---------------------------------------------------------------------------
// Key-value store
// ---------------------------------------------------------------------------

/// Exact-match key-value store with a provider-level key prefix.
///
/// Implementations store values under [`namespaced_key`]`(prefix, key)`;
/// callers pass the bare cache key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Namespace prepended to every key.
    fn key_prefix(&self) -> &str;

    /// Look up the value stored for `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, AiCacheError>;

    /// Store `value` for `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), AiCacheError>;
}

/// Compose the storage key for a cache key: `prefix + ":" + key`.
pub fn namespaced_key(prefix: &str, key: &str) -> String {
    format!("{prefix}:{key}")
}

// ---------------------------------------------------------------------------
// Service addressing
// ---------------------------------------------------------------------------

/// Network target of an external service, addressed the way a gateway cluster is:
/// a service name, a port, and an optional domain that overrides the name as host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTarget {
    pub service_name: String,
    pub service_port: u16,
    pub service_domain: String,
}

impl ServiceTarget {
    pub fn new(service_name: impl Into<String>, service_port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            service_port,
            service_domain: String::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.service_domain = domain.into();
        self
    }

    /// Host part of the target: the domain when set, otherwise the service name.
    pub fn host(&self) -> &str {
        if self.service_domain.is_empty() {
            &self.service_name
        } else {
            &self.service_domain
        }
    }

    /// Base URL for HTTP calls. Port 443 selects `https`.
    pub fn base_url(&self) -> String {
        let scheme = if self.service_port == 443 { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host(), self.service_port)
    }
}
