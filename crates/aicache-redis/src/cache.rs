use std::future::Future;
use std::time::Duration;

use aicache_core::{namespaced_key, AiCacheError, KvStore, ServiceTarget};
use async_trait::async_trait;
use redis::{AsyncCommands, IntoConnectionInfo};
use serde::Deserialize;

/// Configuration for [`RedisCache`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisCacheConfig {
    #[serde(default)]
    pub service_name: String,
    /// Service port (default: `6379`).
    #[serde(default = "default_port")]
    pub service_port: u16,
    #[serde(default)]
    pub service_domain: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Logical database index (default: `0`).
    #[serde(default)]
    pub database: i64,
    /// Per-command timeout in milliseconds (default: `1000`).
    #[serde(default = "default_timeout_ms", rename = "timeout")]
    pub timeout_ms: u64,
    /// Namespace for all cache entries. Defaults to `"ai-cache"`.
    #[serde(default = "default_prefix", rename = "cacheKeyPrefix")]
    pub prefix: String,
    /// Optional TTL in seconds. When set, cached entries expire automatically.
    #[serde(default, rename = "cacheTTL")]
    pub ttl: Option<u64>,
}

fn default_port() -> u16 {
    6379
}

fn default_timeout_ms() -> u64 {
    1_000
}

fn default_prefix() -> String {
    "ai-cache".to_string()
}

impl RedisCacheConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_port: default_port(),
            service_domain: String::new(),
            username: String::new(),
            password: String::new(),
            database: 0,
            timeout_ms: default_timeout_ms(),
            prefix: default_prefix(),
            ttl: None,
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

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl = Some(ttl_secs);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn validate(&self) -> Result<(), AiCacheError> {
        if self.service_name.is_empty() {
            return Err(AiCacheError::Config(
                "[Redis] serviceName is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection target built from parts, so credentials are never parsed
    /// back out of a URL.
    pub fn connection_info(&self) -> Result<redis::ConnectionInfo, AiCacheError> {
        let target = ServiceTarget::new(&self.service_name, self.service_port)
            .with_domain(&self.service_domain);
        let mut settings = redis::RedisConnectionInfo::default().set_db(self.database);
        if !self.username.is_empty() {
            settings = settings.set_username(&self.username);
        }
        if !self.password.is_empty() {
            settings = settings.set_password(&self.password);
        }
        let info = redis::ConnectionAddr::Tcp(target.host().to_string(), self.service_port)
            .into_connection_info()
            .map_err(|e| AiCacheError::Config(format!("invalid Redis target: {e}")))?;
        Ok(info.set_redis_settings(settings))
    }

    /// Target for logs, `redis://host:port/db`. Credentials are left out.
    pub fn url(&self) -> String {
        let target = ServiceTarget::new(&self.service_name, self.service_port)
            .with_domain(&self.service_domain);
        format!(
            "redis://{}:{}/{}",
            target.host(),
            self.service_port,
            self.database
        )
    }
}

/// Redis-backed implementation of the [`KvStore`] trait.
///
/// Stores answers as plain strings under `{prefix}:{key}`. Every command,
/// connection setup included, runs under the configured timeout.
pub struct RedisCache {
    client: redis::Client,
    config: RedisCacheConfig,
}

impl RedisCache {
    /// Create a new `RedisCache`. No connection is opened until first use.
    pub fn new(config: RedisCacheConfig) -> Result<Self, AiCacheError> {
        config.validate()?;
        let client = redis::Client::open(config.connection_info()?)
            .map_err(|e| AiCacheError::Config(format!("invalid Redis target: {e}")))?;
        tracing::debug!(
            redis = %config.url(),
            prefix = %config.prefix,
            "redis cache configured"
        );
        Ok(Self { client, config })
    }

    /// Create a new `RedisCache` with an existing Redis client.
    pub fn with_client(client: redis::Client, config: RedisCacheConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, AiCacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AiCacheError::Cache(format!("Redis connection error: {e}")))
    }

    async fn with_timeout<T>(
        &self,
        op: &str,
        fut: impl Future<Output = Result<T, AiCacheError>>,
    ) -> Result<T, AiCacheError> {
        tokio::time::timeout(Duration::from_millis(self.config.timeout_ms), fut)
            .await
            .map_err(|_| {
                AiCacheError::Timeout(format!(
                    "Redis {op} exceeded {}ms",
                    self.config.timeout_ms
                ))
            })?
    }
}

#[async_trait]
impl KvStore for RedisCache {
    fn key_prefix(&self) -> &str {
        &self.config.prefix
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AiCacheError> {
        let redis_key = namespaced_key(&self.config.prefix, key);
        self.with_timeout("GET", async {
            let mut con = self.get_connection().await?;
            let raw: Option<String> = con
                .get(&redis_key)
                .await
                .map_err(|e| AiCacheError::Cache(format!("Redis GET error: {e}")))?;
            Ok(raw)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AiCacheError> {
        let redis_key = namespaced_key(&self.config.prefix, key);
        self.with_timeout("SET", async {
            let mut con = self.get_connection().await?;
            match self.config.ttl {
                Some(ttl_secs) => con
                    .set_ex::<_, _, ()>(&redis_key, value, ttl_secs)
                    .await
                    .map_err(|e| AiCacheError::Cache(format!("Redis SETEX error: {e}")))?,
                None => con
                    .set::<_, _, ()>(&redis_key, value)
                    .await
                    .map_err(|e| AiCacheError::Cache(format!("Redis SET error: {e}")))?,
            }
            tracing::debug!(key = %redis_key, ttl = ?self.config.ttl, "redis entry written");
            Ok(())
        })
        .await
    }
}
