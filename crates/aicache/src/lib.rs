//! AiCache: a semantic response cache for LLM gateways.
//!
//! This crate re-exports the AiCache sub-crates and adds [`AiCacheConfig`],
//! the JSON configuration document that validates provider settings and wires
//! them into a ready [`CacheEngine`](engine::CacheEngine).
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `redis` |
//! | `redis` | Redis-backed exact-match tier (`redis` section of the config) |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use aicache::AiCacheConfig;
//!
//! # fn example() -> Result<(), aicache::core::AiCacheError> {
//! let config = AiCacheConfig::from_json(r#"{
//!     "embeddingProvider": { "type": "openai", "apiKey": "sk-..." },
//!     "vectorProvider": { "type": "chroma", "serviceName": "chroma.dns", "collectionID": "cache" }
//! }"#)?;
//! let engine = config.build()?;
//! # Ok(())
//! # }
//! ```

mod config;

pub use config::{
    AiCacheConfig, CacheKeyFrom, CacheStreamValueFrom, CacheToolCallsFrom, CacheValueFrom,
    EmbeddingProviderConfig, ResponseTemplate, VectorProviderConfig,
};

/// Error taxonomy, provider contracts, field paths, and the HTTP backend seam.
pub use aicache_core as core;

/// The cache engine: gate, lookup, stream reassembly, write-back.
pub use aicache_engine as engine;

/// Embedding providers: OpenAI-compatible, DashScope, Fake.
pub use aicache_embeddings as embeddings;

/// In-memory cosine-similarity vector store.
pub use aicache_vectorstores as vectorstores;

/// Chroma vector store.
pub use aicache_chroma as chroma;

/// DashVector vector store.
pub use aicache_dashvector as dashvector;

/// Redis key-value store.
#[cfg(feature = "redis")]
pub use aicache_redis as redis;
