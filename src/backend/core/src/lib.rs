#![allow(clippy::result_large_err)]
//! # Adsync Core
//!
//! Backend core for syncing ad-performance reports from rate-limited,
//! asynchronous third-party advertising APIs.
//!
//! ## Architecture
//!
//! - **Store**: shared key-value store abstraction (Redis in production)
//! - **Cache**: TTL cache with read-path request coalescing over the store
//! - **Runner**: bounded-concurrency fire-and-forget task runner
//! - **Tracker**: cross-process job-status tracking for report windows
//! - **Reporting**: date-range splitting bounded by per-channel report limits
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod cache;
pub mod canonical;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod reporting;
pub mod runner;
pub mod store;
pub mod telemetry;
pub mod tracker;

pub use error::{AdsyncError, ErrorCode, ErrorContext, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheKey, CachedValue, KeyType, ReportCache, RequestCoalescer};
    pub use crate::canonical::to_canonical_json;
    pub use crate::channel::Channel;
    pub use crate::config::Config;
    pub use crate::context::AdsyncCore;
    pub use crate::error::{AdsyncError, ErrorCode, ErrorContext, ErrorSeverity, Result};
    pub use crate::reporting::DateRange;
    pub use crate::runner::{RunnerStats, TaskRunner};
    pub use crate::store::{KeyValueStore, MemoryStore, RedisStore};
    pub use crate::tracker::{JobStatus, JobStatusTracker, WindowEntry};
}
