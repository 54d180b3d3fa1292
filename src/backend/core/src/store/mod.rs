//! Shared key-value store abstraction.
//!
//! All cross-process state (cached report payloads, active-report sets) lives
//! behind the [`KeyValueStore`] trait. Two implementations are provided:
//! - **RedisStore**: the production store, one Redis database shared by every
//!   process of the deployment
//! - **MemoryStore**: an in-process store for tests and local development
//!
//! The trait deliberately exposes only the handful of operations the cache and
//! tracker need: string get/set-with-TTL, existence, delete, and set
//! add/remove/members/expire.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use crate::error::Result;
use async_trait::async_trait;

/// Pluggable key-value store with string and set operations.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a string value. `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a string value with a TTL in seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Check whether a key exists (string or set).
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete a key. Returns whether anything was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Add a member to a set. Returns whether the member was newly added.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member from a set. Returns whether the member was present.
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of a set. Empty when the key is absent.
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// Set a TTL in seconds on an existing key. Returns whether the key
    /// existed.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// Store name for logs and metrics labels.
    fn name(&self) -> &'static str;
}
