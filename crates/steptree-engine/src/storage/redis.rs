//! Redis state cache (feature-gated).

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use steptree_core::{Cache, CacheError};

use crate::config::RedisConfig;

/// Redis cache implementation for durable, multi-process deployments.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    /// Create a new Redis cache from a connection URL.
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed.
    pub fn new(connection_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(connection_url)
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create a Redis cache from configuration.
    ///
    /// # Errors
    /// Returns error if the configured URL cannot be parsed.
    pub fn from_config(config: &RedisConfig) -> Result<Self, CacheError> {
        Self::new(&config.url)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| CacheError::Connection(e.to_string())),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| CacheError::Connection(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _removed: u64 = conn
            .del(key)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(())
    }
}
