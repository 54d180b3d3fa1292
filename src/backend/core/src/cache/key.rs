//! Type-safe cache key generation.
//!
//! - Typed key kinds with per-kind default TTLs
//! - Namespacing by account so keys from different advertisers never collide
//! - One place that decides what the store key string looks like

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Key Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Enumeration of cache key types with associated default TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Fetched report payloads (expensive to produce, medium TTL)
    Report,

    /// Ad-account metadata from the platform (changes rarely)
    Account,

    /// Campaign listings (medium TTL)
    Campaign,

    /// Aggregated metrics lookups (short TTL)
    Metrics,

    /// Custom key type
    Custom,
}

impl KeyType {
    /// Get the default TTL for this key type.
    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Report => Duration::from_secs(1800),  // 30 minutes
            Self::Account => Duration::from_secs(3600), // 1 hour
            Self::Campaign => Duration::from_secs(600), // 10 minutes
            Self::Metrics => Duration::from_secs(60),   // 1 minute
            Self::Custom => Duration::from_secs(300),   // 5 minutes
        }
    }

    /// Get the key type prefix for namespacing.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Account => "account",
            Self::Campaign => "campaign",
            Self::Metrics => "metrics",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Key
// ═══════════════════════════════════════════════════════════════════════════════

/// A type-safe cache key with namespace support.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Key type
    key_type: KeyType,

    /// Primary identifier
    id: Option<String>,

    /// Namespace (e.g., ad-account ID)
    namespace: Option<String>,

    /// Additional key segments
    segments: Vec<String>,

    /// Custom TTL override
    ttl: Option<Duration>,
}

impl CacheKey {
    /// Create a new cache key with the given type.
    pub fn new(key_type: KeyType) -> Self {
        Self {
            key_type,
            id: None,
            namespace: None,
            segments: Vec::new(),
            ttl: None,
        }
    }

    /// Set the primary ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add a key segment.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Set custom TTL override.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Get the key type.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Get the TTL (custom or default for key type).
    pub fn ttl(&self) -> Duration {
        self.ttl.unwrap_or_else(|| self.key_type.default_ttl())
    }

    /// Build the cache key string.
    pub fn build(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref ns) = self.namespace {
            parts.push(ns.clone());
        }
        parts.push(self.key_type.prefix().to_string());
        if let Some(ref id) = self.id {
            parts.push(id.clone());
        }
        for segment in &self.segments {
            parts.push(segment.clone());
        }

        parts.join(":")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════════════════

impl CacheKey {
    /// Key for a report window's payload within an account.
    pub fn report(
        ad_account_id: impl Into<String>,
        since: chrono::NaiveDate,
        until: chrono::NaiveDate,
    ) -> Self {
        Self::new(KeyType::Report)
            .with_namespace(ad_account_id)
            .with_id(format!("{}:{}", since, until))
    }

    /// Key for an ad account's metadata.
    pub fn account(ad_account_id: impl Into<String>) -> Self {
        Self::new(KeyType::Account).with_id(ad_account_id)
    }

    /// Key for an account's campaign listing.
    pub fn campaigns(ad_account_id: impl Into<String>) -> Self {
        Self::new(KeyType::Campaign)
            .with_namespace(ad_account_id)
            .with_id("all")
    }

    /// Key for an aggregated metrics lookup.
    pub fn metrics(metric_name: impl Into<String>) -> Self {
        Self::new(KeyType::Metrics).with_id(metric_name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
