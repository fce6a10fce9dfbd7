//! Redis-backed layer of the hot cache. Feature-gated behind `redis`; when
//! the feature is off every method returns an error so callers degrade to
//! the in-process layer instead of silently no-opping on a write.

use anyhow::Result;
#[cfg(feature = "redis")]
use anyhow::Context;
#[cfg(feature = "redis")]
use redis::aio::ConnectionManager;
#[cfg(feature = "redis")]
use redis::{AsyncCommands, Client};

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[cfg(feature = "redis")]
pub struct RedisManager {
    conn: ConnectionManager,
}

#[cfg(not(feature = "redis"))]
pub struct RedisManager {
    _config: RedisConfig,
}

impl RedisManager {
    #[cfg(feature = "redis")]
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).context("failed to create redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        log::info!("connected to hot-cache redis at {}", config.url);
        Ok(Self { conn })
    }

    #[cfg(not(feature = "redis"))]
    pub async fn new(config: RedisConfig) -> Result<Self> {
        Ok(Self { _config: config })
    }

    #[cfg(feature = "redis")]
    pub async fn set_bytes(&mut self, key: &str, bytes: &[u8], ttl_secs: u64) -> Result<()> {
        self.conn
            .set_ex::<_, _, ()>(key, bytes, ttl_secs)
            .await
            .context("failed to write hot cache key")?;
        Ok(())
    }

    #[cfg(not(feature = "redis"))]
    pub async fn set_bytes(&mut self, _key: &str, _bytes: &[u8], _ttl_secs: u64) -> Result<()> {
        anyhow::bail!("redis feature not enabled")
    }

    #[cfg(feature = "redis")]
    pub async fn get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .get(key)
            .await
            .context("failed to read hot cache key")?;
        Ok(bytes)
    }

    #[cfg(not(feature = "redis"))]
    pub async fn get_bytes(&mut self, _key: &str) -> Result<Option<Vec<u8>>> {
        anyhow::bail!("redis feature not enabled")
    }

    /// Keys matching `bundles:{user_id}:*`, used by `bundles_for_user` to
    /// reconstruct a response without round-tripping the durable store.
    #[cfg(feature = "redis")]
    pub async fn keys(&mut self, pattern: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .conn
            .keys(pattern)
            .await
            .context("failed to list hot cache keys")?;
        Ok(keys)
    }

    #[cfg(not(feature = "redis"))]
    pub async fn keys(&mut self, _pattern: &str) -> Result<Vec<String>> {
        anyhow::bail!("redis feature not enabled")
    }

    #[cfg(feature = "redis")]
    pub async fn health_check(&mut self) -> Result<()> {
        let pong: String = redis::cmd("PING")
            .query_async(&mut self.conn)
            .await
            .context("redis health check failed")?;
        if pong == "PONG" {
            Ok(())
        } else {
            anyhow::bail!("unexpected redis response: {}", pong)
        }
    }

    #[cfg(not(feature = "redis"))]
    pub async fn health_check(&mut self) -> Result<()> {
        anyhow::bail!("redis feature not enabled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // requires a running redis instance
    async fn connects_to_local_redis() {
        let manager = RedisManager::new(RedisConfig {
            url: "redis://localhost:6379".to_string(),
        })
        .await;
        assert!(manager.is_ok());
    }
}
