//! In-process key-value store for tests and local development.

use crate::error::{AdsyncError, ErrorCode, Result};
use crate::store::KeyValueStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// DashMap-backed store mirroring the Redis semantics the crate relies on:
/// lazy expiry, type errors on string/set mismatch, and set auto-removal when
/// the last member is removed.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the entry if expired, then return whether a live entry remains.
    fn purge_expired(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                drop(entry);
                self.entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn wrong_type(key: &str) -> AdsyncError {
        AdsyncError::with_internal(
            ErrorCode::StoreError,
            "Operation against a key holding the wrong kind of value",
            format!("key: {}", key),
        )
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if !self.purge_expired(key) {
            return Ok(None);
        }
        match self.entries.get(key).map(|e| e.value.clone()) {
            Some(Value::Text(s)) => Ok(Some(s)),
            Some(Value::Set(_)) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.purge_expired(key))
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let live = self.purge_expired(key);
        Ok(self.entries.remove(key).is_some() && live)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.purge_expired(key);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Set(members) => Ok(members.insert(member.to_string())),
            Value::Text(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        if !self.purge_expired(key) {
            return Ok(false);
        }
        let removed = match self.entries.get_mut(key).as_deref_mut() {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => members.remove(member),
            Some(_) => return Err(Self::wrong_type(key)),
            None => false,
        };
        // Redis drops empty sets
        let now_empty = matches!(
            self.entries.get(key).as_deref(),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) if members.is_empty()
        );
        if now_empty {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        if !self.purge_expired(key) {
            return Ok(Vec::new());
        }
        match self.entries.get(key).map(|e| e.value.clone()) {
            Some(Value::Set(members)) => Ok(members.into_iter().collect()),
            Some(Value::Text(_)) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        if !self.purge_expired(key) {
            return Ok(false);
        }
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
