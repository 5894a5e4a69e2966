//! Redis integration for AiCache.
//!
//! [`RedisCache`] implements the [`KvStore`](aicache_core::KvStore) trait for
//! the exact-match tier: `GET`/`SET` under `{cacheKeyPrefix}:{key}`, with
//! optional TTL expiration managed by Redis itself.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use aicache_redis::{RedisCache, RedisCacheConfig};
//!
//! # fn example() -> Result<(), aicache_core::AiCacheError> {
//! let config = RedisCacheConfig::new("redis.dns").with_ttl(3600);
//! let cache = RedisCache::new(config)?;
//! # Ok(())
//! # }
//! ```

mod cache;

pub use cache::{RedisCache, RedisCacheConfig};

pub use aicache_core::KvStore;
