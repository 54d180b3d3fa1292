//! Composition root owning the store connection and component lifecycle.

use crate::cache::ReportCache;
use crate::config::Config;
use crate::error::Result;
use crate::runner::TaskRunner;
use crate::store::{KeyValueStore, MemoryStore, RedisStore};
use crate::tracker::JobStatusTracker;
use std::sync::Arc;
use tracing::info;

/// The assembled core: one store connection shared by the cache, tracker,
/// and runner. Callers construct exactly one per process and pass references
/// into their workers.
pub struct AdsyncCore {
    pub store: Arc<dyn KeyValueStore>,
    pub cache: ReportCache,
    pub tracker: JobStatusTracker,
    pub runner: TaskRunner,
}

impl AdsyncCore {
    /// Connect to Redis and assemble the components.
    pub async fn connect(config: Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(config.redis.clone()).await?);
        Ok(Self::assemble(store, config))
    }

    /// Assemble over an in-process store, for tests and local development.
    pub fn in_memory(config: Config) -> Self {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        Self::assemble(store, config)
    }

    fn assemble(store: Arc<dyn KeyValueStore>, config: Config) -> Self {
        let cache = ReportCache::new(store.clone(), config.cache.clone());
        let tracker = JobStatusTracker::new(store.clone(), config.tracker.clone());
        let runner = TaskRunner::new(config.runner.concurrency);
        info!(store = store.name(), "Core assembled");
        Self {
            store,
            cache,
            tracker,
            runner,
        }
    }

    /// Stop accepting background work. Running tasks finish; the store
    /// connection closes when the core is dropped.
    pub fn shutdown(&self) {
        self.runner.stop();
        info!("Core shut down");
    }
}
