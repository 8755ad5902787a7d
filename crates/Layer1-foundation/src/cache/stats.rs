//! Aggregate cache statistics

use super::CachePriority;
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot produced by [`CacheStore::stats`](super::CacheStore::stats)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    /// Entries that no longer decode; removed on next read or `clear_expired`
    pub corrupted_entries: usize,
    /// Encoded size of all entries, keys included
    pub size_bytes: usize,
    pub by_priority: BTreeMap<CachePriority, usize>,
    pub by_status_code: BTreeMap<u16, usize>,
}

impl CacheStats {
    /// Share of decodable entries that are still valid
    pub fn valid_ratio(&self) -> f64 {
        let decodable = self.valid_entries + self.expired_entries;
        if decodable > 0 {
            self.valid_entries as f64 / decodable as f64
        } else {
            0.0
        }
    }
}
