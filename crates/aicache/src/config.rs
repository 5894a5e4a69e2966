use std::sync::Arc;

use aicache_chroma::{ChromaConfig, ChromaVectorStore};
use aicache_core::{
    AiCacheError, Embeddings, HttpBackend, JsonPath, KvStore, ProviderBackend,
    VectorStoreProvider,
};
use aicache_dashvector::{DashVectorConfig, DashVectorStore};
use aicache_embeddings::{
    DashScopeEmbeddings, DashScopeEmbeddingsConfig, OpenAiEmbeddings, OpenAiEmbeddingsConfig,
};
use aicache_engine::{CacheEngine, FieldPaths, InMemoryKvStore, SemanticSearch};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Field path sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheKeyFrom {
    pub request_body: JsonPath,
}

impl Default for CacheKeyFrom {
    fn default() -> Self {
        Self {
            request_body: FieldPaths::default().cache_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheValueFrom {
    pub response_body: JsonPath,
}

impl Default for CacheValueFrom {
    fn default() -> Self {
        Self {
            response_body: FieldPaths::default().cache_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheStreamValueFrom {
    pub response_body: JsonPath,
}

impl Default for CacheStreamValueFrom {
    fn default() -> Self {
        Self {
            response_body: FieldPaths::default().cache_stream_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheToolCallsFrom {
    pub response_body: JsonPath,
    pub stream_response_body: JsonPath,
}

impl Default for CacheToolCallsFrom {
    fn default() -> Self {
        let paths = FieldPaths::default();
        Self {
            response_body: paths.tool_calls,
            stream_response_body: paths.stream_tool_calls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseTemplate {
    pub model: String,
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self {
            model: "from-cache".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider sections
// ---------------------------------------------------------------------------

/// Embedding provider, selected by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingProviderConfig {
    #[serde(rename = "openai")]
    OpenAi(OpenAiEmbeddingsConfig),
    DashScope(DashScopeEmbeddingsConfig),
}

impl EmbeddingProviderConfig {
    pub fn validate(&self) -> Result<(), AiCacheError> {
        match self {
            EmbeddingProviderConfig::OpenAi(c) => c.validate(),
            EmbeddingProviderConfig::DashScope(c) => c.validate(),
        }
    }

    fn build(
        &self,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Arc<dyn Embeddings>, AiCacheError> {
        Ok(match self {
            EmbeddingProviderConfig::OpenAi(c) => {
                Arc::new(OpenAiEmbeddings::new(c.clone(), backend)?)
            }
            EmbeddingProviderConfig::DashScope(c) => {
                Arc::new(DashScopeEmbeddings::new(c.clone(), backend)?)
            }
        })
    }
}

/// Vector store, selected by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VectorProviderConfig {
    Chroma(ChromaConfig),
    DashVector(DashVectorConfig),
}

impl VectorProviderConfig {
    pub fn validate(&self) -> Result<(), AiCacheError> {
        match self {
            VectorProviderConfig::Chroma(c) => c.validate(),
            VectorProviderConfig::DashVector(c) => c.validate(),
        }
    }

    /// Candidates requested per query.
    pub fn top_k(&self) -> usize {
        match self {
            VectorProviderConfig::Chroma(c) => c.top_k,
            VectorProviderConfig::DashVector(c) => c.top_k,
        }
    }

    fn build(
        &self,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Arc<dyn VectorStoreProvider>, AiCacheError> {
        Ok(match self {
            VectorProviderConfig::Chroma(c) => {
                Arc::new(ChromaVectorStore::new(c.clone(), backend)?)
            }
            VectorProviderConfig::DashVector(c) => {
                Arc::new(DashVectorStore::new(c.clone(), backend)?)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// AiCacheConfig
// ---------------------------------------------------------------------------

/// The cache's configuration document.
///
/// ```json
/// {
///   "cacheKeyFrom": { "requestBody": "messages[-1].content" },
///   "redis": { "serviceName": "redis.static", "cacheTTL": 3600 },
///   "embeddingProvider": { "type": "dashscope", "apiKey": "sk-..." },
///   "vectorProvider": { "type": "dashvector", "apiKey": "...", "serviceName": "dv.dns",
///                       "serviceDomain": "vrs-cn-xxx.dashvector.aliyuncs.com",
///                       "collectionID": "cache" }
/// }
/// ```
///
/// Without `redis`, exact matches are kept in process. Semantic search needs
/// both `embeddingProvider` and `vectorProvider`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiCacheConfig {
    #[serde(default)]
    pub cache_key_from: CacheKeyFrom,
    #[serde(default)]
    pub cache_value_from: CacheValueFrom,
    #[serde(default)]
    pub cache_stream_value_from: CacheStreamValueFrom,
    #[serde(default)]
    pub cache_tool_calls_from: CacheToolCallsFrom,
    #[serde(default)]
    pub response_template: ResponseTemplate,
    #[cfg(feature = "redis")]
    #[serde(default)]
    pub redis: Option<aicache_redis::RedisCacheConfig>,
    #[serde(default)]
    pub embedding_provider: Option<EmbeddingProviderConfig>,
    #[serde(default)]
    pub vector_provider: Option<VectorProviderConfig>,
}

impl AiCacheConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, AiCacheError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AiCacheError::Config(format!("invalid ai-cache config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AiCacheError> {
        match (&self.embedding_provider, &self.vector_provider) {
            (Some(embedding), Some(vector)) => {
                embedding.validate()?;
                vector.validate()?;
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(AiCacheError::Config(
                    "embeddingProvider is set but vectorProvider is missing".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(AiCacheError::Config(
                    "vectorProvider is set but embeddingProvider is missing".to_string(),
                ));
            }
        }
        #[cfg(feature = "redis")]
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        Ok(())
    }

    pub fn field_paths(&self) -> FieldPaths {
        FieldPaths {
            cache_key: self.cache_key_from.request_body.clone(),
            cache_value: self.cache_value_from.response_body.clone(),
            cache_stream_value: self.cache_stream_value_from.response_body.clone(),
            tool_calls: self.cache_tool_calls_from.response_body.clone(),
            stream_tool_calls: self.cache_tool_calls_from.stream_response_body.clone(),
        }
    }

    /// Build an engine whose HTTP providers share one [`HttpBackend`].
    pub fn build(&self) -> Result<CacheEngine, AiCacheError> {
        self.build_with_backend(Arc::new(HttpBackend::new()))
    }

    /// Build an engine whose HTTP providers go through `backend`.
    pub fn build_with_backend(
        &self,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<CacheEngine, AiCacheError> {
        self.validate()?;

        let mut engine = CacheEngine::new(self.build_kv()?)
            .with_field_paths(self.field_paths())
            .with_response_model(&self.response_template.model);

        if let (Some(embedding), Some(vector)) = (&self.embedding_provider, &self.vector_provider)
        {
            let embeddings = embedding.build(Arc::clone(&backend))?;
            let store = vector.build(backend)?;
            tracing::info!(provider = store.provider_type(), "semantic search enabled");
            engine = engine.with_semantic_search(
                SemanticSearch::new(embeddings, store).with_top_k(vector.top_k()),
            );
        }
        Ok(engine)
    }

    fn build_kv(&self) -> Result<Arc<dyn KvStore>, AiCacheError> {
        #[cfg(feature = "redis")]
        if let Some(redis) = &self.redis {
            return Ok(Arc::new(aicache_redis::RedisCache::new(redis.clone())?));
        }
        Ok(Arc::new(InMemoryKvStore::default()))
    }
}
