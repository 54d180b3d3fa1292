//! Redis-backed key-value store.

use crate::config::RedisConfig;
use crate::error::{AdsyncError, ErrorCode, Result};
use crate::store::KeyValueStore;
use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;

/// Production store backed by a shared Redis database.
///
/// Every key is namespaced with the configured prefix so multiple deployments
/// can share one database.
pub struct RedisStore {
    client: redis::Client,
    config: RedisConfig,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            AdsyncError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Failed to create Redis client",
                e.to_string(),
            )
        })?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                AdsyncError::with_internal(
                    ErrorCode::StoreConnectionFailed,
                    "Failed to connect to Redis",
                    e.to_string(),
                )
            })?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            AdsyncError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Redis ping failed",
                e.to_string(),
            )
        })?;

        info!(url = %config.url, "Redis store connected");

        Ok(Self { client, config })
    }

    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                AdsyncError::with_internal(
                    ErrorCode::StoreConnectionFailed,
                    "Failed to get Redis connection",
                    e.to_string(),
                )
            })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(self.full_key(key)).await.map_err(AdsyncError::from)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.get_conn().await?;
        conn.set_ex::<_, _, ()>(self.full_key(key), value, ttl_secs)
            .await
            .map_err(AdsyncError::from)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let exists: bool = conn.exists(self.full_key(key)).await.map_err(AdsyncError::from)?;
        Ok(exists)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let deleted: i64 = conn.del(self.full_key(key)).await.map_err(AdsyncError::from)?;
        Ok(deleted > 0)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let added: i64 = conn
            .sadd(self.full_key(key), member)
            .await
            .map_err(AdsyncError::from)?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let removed: i64 = conn
            .srem(self.full_key(key), member)
            .await
            .map_err(AdsyncError::from)?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.get_conn().await?;
        let members: Vec<String> = conn
            .smembers(self.full_key(key))
            .await
            .map_err(AdsyncError::from)?;
        Ok(members)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let set: bool = conn
            .expire(self.full_key(key), ttl_secs as i64)
            .await
            .map_err(AdsyncError::from)?;
        Ok(set)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
