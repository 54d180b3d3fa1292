//! Read-path request coalescing.
//!
//! Many workers tend to ask for the same cache key at the same moment (every
//! campaign of an account refreshing at once). The coalescer batches all
//! requests for one key that arrive before the task yields back to the
//! scheduler, then issues a single store read and hands the same result to
//! every waiter.
//!
//! The batching window is one scheduler pass: the first request for a key
//! opens a batch, yields once, and then drains it itself. Because the opener
//! drives the flush, the batch cannot drain while the opening task is still
//! between awaits, so every request issued without an intervening await joins
//! that batch on any runtime flavor. Requests for distinct keys flush
//! independently.

use crate::error::{AdsyncError, Result};
use crate::store::KeyValueStore;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

type BatchResult = std::result::Result<Option<String>, Arc<AdsyncError>>;
type Batches = Mutex<HashMap<String, Vec<oneshot::Sender<BatchResult>>>>;

/// Removes the batch from the map on drop. If the opening request future is
/// cancelled before it flushes, the waiters' senders drop with the entry and
/// every attached caller gets an error instead of hanging.
struct BatchGuard {
    batches: Arc<Batches>,
    key: String,
}

impl BatchGuard {
    fn take_waiters(&self) -> Vec<oneshot::Sender<BatchResult>> {
        self.batches.lock().remove(&self.key).unwrap_or_default()
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.batches.lock().remove(&self.key);
    }
}

/// Collapses concurrent reads of the same key into one store read per
/// scheduling pass.
pub struct RequestCoalescer {
    store: Arc<dyn KeyValueStore>,
    batches: Arc<Batches>,
}

impl RequestCoalescer {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            batches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Read a key through the current batch.
    ///
    /// Guarantee: at most one backing read per key per scheduling pass,
    /// regardless of caller count. The opening caller yields once and then
    /// drains the batch itself, so requests issued before the opener's task
    /// is next polled all share that read. All waiters of a batch see the
    /// same value, and a failed read fails every waiter.
    pub async fn request(&self, key: &str) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();

        let opened_batch = {
            let mut batches = self.batches.lock();
            match batches.get_mut(key) {
                Some(waiters) => {
                    waiters.push(tx);
                    counter!("adsync_cache_coalesced_reads_total").increment(1);
                    false
                }
                None => {
                    batches.insert(key.to_string(), vec![tx]);
                    true
                }
            }
        };

        if opened_batch {
            let guard = BatchGuard {
                batches: self.batches.clone(),
                key: key.to_string(),
            };
            tokio::task::yield_now().await;
            self.flush(guard).await;
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(shared)) => Err(AdsyncError::with_internal(
                shared.code(),
                shared.user_message().to_string(),
                shared.to_string(),
            )),
            Err(_) => Err(AdsyncError::internal("Coalesced read was dropped")),
        }
    }

    /// Drain one key's batch: issue the single read and fan the result out.
    async fn flush(&self, guard: BatchGuard) {
        let waiters = guard.take_waiters();
        if waiters.is_empty() {
            return;
        }

        debug!(key = %guard.key, waiters = waiters.len(), "Flushing coalesced read");

        let result: BatchResult = self.store.get(&guard.key).await.map_err(|e| {
            e.log();
            Arc::new(e)
        });

        for waiter in waiters {
            // A waiter that gave up is fine to skip
            let _ = waiter.send(result.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that counts backing reads.
    struct CountingStore {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                reads: AtomicUsize::new(0),
            }
        }

        fn read_count(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyValueStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
            self.inner.set_ex(key, value, ttl_secs).await
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }

        async fn del(&self, key: &str) -> Result<bool> {
            self.inner.del(key).await
        }

        async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
            self.inner.sadd(key, member).await
        }

        async fn srem(&self, key: &str, member: &str) -> Result<bool> {
            self.inner.srem(key, member).await
        }

        async fn smembers(&self, key: &str) -> Result<Vec<String>> {
            self.inner.smembers(key).await
        }

        async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
            self.inner.expire(key, ttl_secs).await
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_read() {
        let store = Arc::new(CountingStore::new());
        store.set_ex("k", "v", 60).await.unwrap();

        let coalescer = Arc::new(RequestCoalescer::new(store.clone()));

        let mut pending = Vec::new();
        for _ in 0..16 {
            let coalescer = coalescer.clone();
            pending.push(async move { coalescer.request("k").await });
        }
        let results = futures::future::join_all(pending).await;

        for result in results {
            assert_eq!(result.unwrap(), Some("v".to_string()));
        }
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_holds_until_opening_task_yields() {
        let store = Arc::new(CountingStore::new());
        store.set_ex("k", "v", 60).await.unwrap();

        let coalescer = Arc::new(RequestCoalescer::new(store.clone()));

        // Open the batch, then stall this task without awaiting. Nothing may
        // drain the batch in the meantime, even with idle worker threads.
        let first = coalescer.request("k");
        let second = coalescer.request("k");
        tokio::pin!(first, second);
        assert!(futures::poll!(first.as_mut()).is_pending());
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert!(futures::poll!(second.as_mut()).is_pending());

        let (r1, r2) = tokio::join!(first, second);
        assert_eq!(r1.unwrap(), Some("v".to_string()));
        assert_eq!(r2.unwrap(), Some("v".to_string()));
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_opener_fails_waiters_instead_of_hanging() {
        let store = Arc::new(CountingStore::new());
        store.set_ex("k", "v", 60).await.unwrap();

        let coalescer = Arc::new(RequestCoalescer::new(store.clone()));

        let mut opener = Box::pin(coalescer.request("k"));
        let waiter = coalescer.request("k");
        tokio::pin!(waiter);
        assert!(futures::poll!(opener.as_mut()).is_pending());
        assert!(futures::poll!(waiter.as_mut()).is_pending());
        drop(opener);

        assert!(waiter.await.is_err());

        // the key is not wedged: a fresh request reads normally
        assert_eq!(coalescer.request("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_distinct_keys_read_independently() {
        let store = Arc::new(CountingStore::new());
        store.set_ex("a", "1", 60).await.unwrap();
        store.set_ex("b", "2", 60).await.unwrap();

        let coalescer = Arc::new(RequestCoalescer::new(store.clone()));

        let (ra, rb) = tokio::join!(coalescer.request("a"), coalescer.request("b"));
        assert_eq!(ra.unwrap(), Some("1".to_string()));
        assert_eq!(rb.unwrap(), Some("2".to_string()));
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn test_sequential_requests_read_separately() {
        let store = Arc::new(CountingStore::new());
        store.set_ex("k", "v", 60).await.unwrap();

        let coalescer = RequestCoalescer::new(store.clone());

        coalescer.request("k").await.unwrap();
        coalescer.request("k").await.unwrap();
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_resolves_none_for_all_waiters() {
        let store = Arc::new(CountingStore::new());
        let coalescer = Arc::new(RequestCoalescer::new(store.clone()));

        let (r1, r2) = tokio::join!(coalescer.request("absent"), coalescer.request("absent"));
        assert_eq!(r1.unwrap(), None);
        assert_eq!(r2.unwrap(), None);
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_read_rejects_all_waiters() {
        struct FailingStore;

        #[async_trait]
        impl KeyValueStore for FailingStore {
            async fn get(&self, _key: &str) -> Result<Option<String>> {
                Err(AdsyncError::internal("read refused"))
            }
            async fn set_ex(&self, _: &str, _: &str, _: u64) -> Result<()> {
                Ok(())
            }
            async fn exists(&self, _: &str) -> Result<bool> {
                Ok(false)
            }
            async fn del(&self, _: &str) -> Result<bool> {
                Ok(false)
            }
            async fn sadd(&self, _: &str, _: &str) -> Result<bool> {
                Ok(false)
            }
            async fn srem(&self, _: &str, _: &str) -> Result<bool> {
                Ok(false)
            }
            async fn smembers(&self, _: &str) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
            async fn expire(&self, _: &str, _: u64) -> Result<bool> {
                Ok(false)
            }
            fn name(&self) -> &'static str {
                "failing"
            }
        }

        let coalescer = Arc::new(RequestCoalescer::new(Arc::new(FailingStore)));
        let (r1, r2) = tokio::join!(coalescer.request("k"), coalescer.request("k"));
        assert!(r1.is_err());
        assert!(r2.is_err());
    }
}
