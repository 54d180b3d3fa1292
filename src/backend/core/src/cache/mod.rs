//! TTL cache over the shared key-value store.
//!
//! The cache fronts expensive third-party lookups:
//!
//! - **Type-safe keys**: [`CacheKey`] decides the store key string and carries
//!   the per-kind TTL
//! - **Coalesced reads**: concurrent reads of one key share a single store
//!   read per scheduling pass via [`RequestCoalescer`]
//! - **Producer closures**: a miss runs the caller's producer and stores the
//!   result; producer failures are returned, never cached
//!
//! Writes are deliberately not single-flighted: `force_update` always runs
//! the producer, so concurrent refreshes of one key each hit the platform.

pub mod coalescer;
pub mod key;

pub use coalescer::RequestCoalescer;
pub use key::{CacheKey, KeyType};

use crate::canonical::to_canonical_json;
use crate::config::CacheConfig;
use crate::error::{AdsyncError, Result};
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use metrics::{counter, histogram};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

// ═══════════════════════════════════════════════════════════════════════════════
// Cached Value
// ═══════════════════════════════════════════════════════════════════════════════

/// The stored form of a cache entry. Replaced wholesale on refresh.
///
/// `expires_at` is advisory metadata for observability; actual expiry is
/// enforced by the store's TTL on the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedValue<T> {
    pub expires_at: DateTime<Utc>,
    pub payload: T,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Report Cache
// ═══════════════════════════════════════════════════════════════════════════════

/// TTL cache with coalesced reads and always-fresh writes.
pub struct ReportCache {
    store: Arc<dyn KeyValueStore>,
    coalescer: RequestCoalescer,
    config: CacheConfig,
}

impl ReportCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        let coalescer = RequestCoalescer::new(store.clone());
        Self {
            store,
            coalescer,
            config,
        }
    }

    /// Get the cached payload, producing and storing it on a miss.
    ///
    /// The read goes through the coalescer, so concurrent callers of one key
    /// share a single store read. On a miss every caller falls through to
    /// [`Self::force_update`] independently.
    #[instrument(skip(self, producer), fields(key = %key))]
    pub async fn get_value<T, F, Fut>(&self, key: &CacheKey, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key_string = key.build();
        if let Some(raw) = self.coalescer.request(&key_string).await? {
            let cached: CachedValue<T> = serde_json::from_str(&raw)?;
            counter!("adsync_cache_hits_total", "key_type" => key.key_type().prefix())
                .increment(1);
            debug!(key = %key_string, "Cache hit");
            return Ok(cached.payload);
        }

        counter!("adsync_cache_misses_total", "key_type" => key.key_type().prefix()).increment(1);
        self.force_update(key, producer).await
    }

    /// Run the producer unconditionally and store its result.
    ///
    /// A producer failure is logged and returned without touching the store,
    /// so negative results are never cached. A panicking producer is caught
    /// and returned as an error the same way.
    #[instrument(skip(self, producer), fields(key = %key))]
    pub async fn force_update<T, F, Fut>(&self, key: &CacheKey, producer: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let produced = std::panic::AssertUnwindSafe(producer()).catch_unwind().await;
        histogram!("adsync_cache_producer_duration_seconds", "key_type" => key.key_type().prefix())
            .record(started.elapsed().as_secs_f64());

        let payload = match produced {
            Ok(Ok(payload)) => payload,
            Ok(Err(err)) => {
                err.log();
                return Err(err);
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let err = AdsyncError::with_internal(
                    crate::error::ErrorCode::ProducerPanicked,
                    "Value producer panicked",
                    message,
                );
                err.log();
                return Err(err);
            }
        };

        let ttl = self.ttl_for(key);
        let entry = CachedValue {
            expires_at: Utc::now() + chrono::Duration::seconds(ttl as i64),
            payload,
        };
        let serialized = to_canonical_json(&entry)?;
        self.store.set_ex(&key.build(), &serialized, ttl).await?;

        debug!(key = %key, ttl_secs = ttl, "Cache entry written");
        Ok(entry.payload)
    }

    /// Existence check without deserialization.
    pub async fn has(&self, key: &CacheKey) -> Result<bool> {
        self.store.exists(&key.build()).await
    }

    fn ttl_for(&self, key: &CacheKey) -> u64 {
        let from_key = key.ttl().as_secs();
        if from_key > 0 {
            from_key
        } else {
            self.config.default_ttl_secs
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
