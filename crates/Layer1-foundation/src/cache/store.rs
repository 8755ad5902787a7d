//! Cache Store
//!
//! Typed wrapper around a [`KvBackend`]: entry encoding, dual expiry checks,
//! self-healing of corrupted entries and pattern eviction.

use super::backend::KvBackend;
use super::clock::{Clock, SystemClock};
use super::{CacheEntry, CacheKey, CachePriority, CacheStats, CACHE_KEY_PREFIX};
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How [`CacheStore::delete_by_pattern`] compares keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Key contains the pattern
    #[default]
    Contains,
    /// Key equals the pattern
    Exact,
    /// Key starts with the pattern
    Prefix,
}

impl MatchMode {
    fn matches(self, key: &str, pattern: &str) -> bool {
        match self {
            MatchMode::Contains => key.contains(pattern),
            MatchMode::Exact => key == pattern,
            MatchMode::Prefix => key.starts_with(pattern),
        }
    }
}

/// What a read found after validation
enum Inspection {
    Valid(CacheEntry),
    Expired,
    Corrupted,
    Missing,
}

/// Cache store shared by every pipeline execution
///
/// Cheap to clone; clones share the backend and clock.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish_non_exhaustive()
    }
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<dyn KvBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Store backed by a fresh [`MemoryBackend`](super::MemoryBackend)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(super::MemoryBackend::new()))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================================================
    // Read / write
    // ========================================================================

    /// Read a valid entry
    ///
    /// Expired and undecodable entries are deleted and reported as absent;
    /// only backend failures surface as errors.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        match self.inspect(key.as_str()).await? {
            Inspection::Valid(entry) => Ok(Some(entry)),
            Inspection::Expired => {
                debug!("Cache entry expired: {}", key);
                self.backend.delete(key.as_str()).await?;
                Ok(None)
            }
            Inspection::Corrupted => {
                warn!("Dropping corrupted cache entry: {}", key);
                self.backend.delete(key.as_str()).await?;
                Ok(None)
            }
            Inspection::Missing => Ok(None),
        }
    }

    /// Payload of a valid entry
    pub async fn get_data(&self, key: &CacheKey) -> Result<Option<Value>> {
        Ok(self.get(key).await?.map(|entry| entry.data))
    }

    /// Write (replace) an entry stamped with the current time
    pub async fn put(
        &self,
        key: &CacheKey,
        data: Value,
        ttl: Duration,
        priority: CachePriority,
        status_code: u16,
        headers: HashMap<String, String>,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry::new(data, self.clock.now(), ttl, priority, status_code)
            .with_headers(headers);
        self.put_entry(key, &entry).await?;
        Ok(entry)
    }

    pub async fn put_entry(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let raw = entry.encode()?;
        self.backend.put(key.as_str(), raw).await?;
        debug!("Cached {} (ttl {:?})", key, entry.ttl());
        Ok(())
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.backend.delete(key.as_str()).await
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Remove every gateway key matching `pattern`; returns the count removed
    pub async fn delete_by_pattern(&self, pattern: &str, mode: MatchMode) -> Result<usize> {
        let mut removed = 0;
        for key in self.backend.keys(CACHE_KEY_PREFIX).await? {
            if mode.matches(&key, pattern) && self.backend.delete(&key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Evicted {} cache entries matching '{}'", removed, pattern);
        }
        Ok(removed)
    }

    /// Remove expired and corrupted entries; returns the count removed
    pub async fn clear_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.backend.keys(CACHE_KEY_PREFIX).await? {
            match self.inspect(&key).await? {
                Inspection::Expired | Inspection::Corrupted => {
                    if self.backend.delete(&key).await? {
                        removed += 1;
                    }
                }
                Inspection::Valid(_) | Inspection::Missing => {}
            }
        }
        Ok(removed)
    }

    /// Remove every gateway entry; returns the count removed
    pub async fn clear_all(&self) -> Result<usize> {
        self.delete_by_pattern(CACHE_KEY_PREFIX, MatchMode::Prefix)
            .await
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Gateway keys under `prefix`, which is relative to the key namespace
    /// (e.g. `"GET:"`)
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let full = format!("{}{}", CACHE_KEY_PREFIX, prefix);
        self.backend.keys(&full).await
    }

    /// Aggregate statistics; read-only, nothing is deleted
    pub async fn stats(&self) -> Result<CacheStats> {
        let now = self.clock.now();
        let mut stats = CacheStats::default();

        for key in self.backend.keys(CACHE_KEY_PREFIX).await? {
            let Some(raw) = self.backend.get(&key).await? else {
                continue;
            };
            stats.total_entries += 1;
            stats.size_bytes += key.len() + raw.len();

            match CacheEntry::decode(&raw) {
                Ok(entry) => {
                    if entry.is_valid_at(now) {
                        stats.valid_entries += 1;
                    } else {
                        stats.expired_entries += 1;
                    }
                    *stats.by_priority.entry(entry.priority).or_default() += 1;
                    *stats.by_status_code.entry(entry.status_code).or_default() += 1;
                }
                Err(_) => stats.corrupted_entries += 1,
            }
        }

        Ok(stats)
    }

    async fn inspect(&self, key: &str) -> Result<Inspection> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(Inspection::Missing);
        };
        Ok(match CacheEntry::decode(&raw) {
            Ok(entry) if entry.is_valid_at(self.clock.now()) => Inspection::Valid(entry),
            Ok(_) => Inspection::Expired,
            Err(_) => Inspection::Corrupted,
        })
    }
}
