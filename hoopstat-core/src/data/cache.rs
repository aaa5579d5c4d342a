//! Time-expiring cache of raw player records.
//!
//! `CacheStore` is the contract the pipeline depends on; it is constructed once
//! and injected, never looked up globally. Two backings:
//! - [`MemoryCache`]: sharded in-process map, one lock per shard
//! - [`super::file_cache::FileCache`]: one JSON document per player on disk
//!
//! An entry is readable iff `now < expires_at`. Expired entries read as a
//! miss and are overwritten by the next `put` or removed by `purge_expired`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

use super::clock::{Clock, SystemClock};
use crate::domain::{RawRecord, SubjectId};

/// Backing-store failures. Callers degrade these to a miss.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache I/O error: {0}")]
    Io(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// A cached record and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record: RawRecord,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(record: RawRecord, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            record,
            stored_at: now,
            expires_at: expiry(now, ttl),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// `now + ttl`, saturating at the far future for absurd TTLs.
pub(crate) fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Keyed, time-expiring store of raw records. Safe for concurrent use.
pub trait CacheStore: Send + Sync {
    /// The record if present and unexpired.
    fn get(&self, subject: &SubjectId) -> Result<Option<RawRecord>, CacheError>;

    /// Store unconditionally (last write wins).
    fn put(&self, subject: &SubjectId, record: RawRecord, ttl: Duration) -> Result<(), CacheError>;

    fn invalidate(&self, subject: &SubjectId) -> Result<(), CacheError>;
}

const DEFAULT_SHARDS: usize = 16;

type Shard = RwLock<HashMap<String, CacheEntry>>;

/// In-memory cache. Keys are spread over independently locked shards so
/// writers for different players rarely contend and no lock spans the whole map.
pub struct MemoryCache {
    shards: Vec<Shard>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shards: (0..DEFAULT_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            clock,
        }
    }

    fn shard(&self, key: &str) -> &Shard {
        let idx = blake3::hash(key.as_bytes()).as_bytes()[0] as usize % self.shards.len();
        &self.shards[idx]
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().map(|m| m.len()).unwrap_or(0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for shard in &self.shards {
            if let Ok(mut map) = shard.write() {
                let before = map.len();
                map.retain(|_, entry| entry.is_valid_at(now));
                removed += before - map.len();
            }
        }
        removed
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Unavailable("cache shard lock poisoned".into())
}

impl CacheStore for MemoryCache {
    fn get(&self, subject: &SubjectId) -> Result<Option<RawRecord>, CacheError> {
        let key = subject.cache_key();
        let shard = self.shard(&key);
        let now = self.clock.now();

        {
            let map = shard.read().map_err(poisoned)?;
            match map.get(&key) {
                None => return Ok(None),
                Some(entry) if entry.is_valid_at(now) => return Ok(Some(entry.record.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict unless a concurrent put already refreshed it
        let mut map = shard.write().map_err(poisoned)?;
        if map.get(&key).is_some_and(|e| !e.is_valid_at(now)) {
            map.remove(&key);
        }
        Ok(None)
    }

    fn put(&self, subject: &SubjectId, record: RawRecord, ttl: Duration) -> Result<(), CacheError> {
        let key = subject.cache_key();
        let entry = CacheEntry::new(record, self.clock.now(), ttl);
        self.shard(&key).write().map_err(poisoned)?.insert(key, entry);
        Ok(())
    }

    fn invalidate(&self, subject: &SubjectId) -> Result<(), CacheError> {
        let key = subject.cache_key();
        self.shard(&key).write().map_err(poisoned)?.remove(&key);
        Ok(())
    }
}
