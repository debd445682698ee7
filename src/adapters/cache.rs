use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use crate::{
    config::RedisConfig,
    ports::cache::{Cache, CacheError, CacheResult},
};

/// `redis://[:password@]host:port/`
pub fn redis_url(config: &RedisConfig) -> String {
    if config.password.is_empty() {
        format!("redis://{}:{}/", config.host, config.port)
    } else {
        format!(
            "redis://:{}@{}:{}/",
            urlencoding::encode(&config.password),
            config.host,
            config.port
        )
    }
}

/// Redis cache behind a reconnecting connection manager.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(redis_url(config))
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        // The manager closes its connection once the last clone drops
        tracing::debug!("Redis connection manager released");
        Ok(())
    }
}
