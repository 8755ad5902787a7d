//! Cache configuration

use crate::cache::CachePriority;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response cache settings shared by every domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Master switch; when false every strategy behaves as network-only
    /// (cacheOnly fails with a cache miss)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// TTL applied when neither the call nor the domain overrides it (seconds)
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Response status codes that trigger a cache fallback
    #[serde(default = "default_fallback_status_codes")]
    pub fallback_status_codes: Vec<u16>,

    /// Fall back to cached data on connectivity failures
    #[serde(default = "default_fallback_on_network_failure")]
    pub fallback_on_network_failure: bool,

    #[serde(default)]
    pub default_priority: CachePriority,

    /// Request headers that take part in the cache key (case-insensitive)
    #[serde(default)]
    pub key_headers: Vec<String>,
}

fn default_enabled() -> bool {
    true
}
fn default_ttl_secs() -> u64 {
    300
} // 5 minutes
fn default_fallback_status_codes() -> Vec<u16> {
    vec![500, 502, 503, 504]
}
fn default_fallback_on_network_failure() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_ttl_secs: default_ttl_secs(),
            fallback_status_codes: default_fallback_status_codes(),
            fallback_on_network_failure: default_fallback_on_network_failure(),
            default_priority: CachePriority::default(),
            key_headers: Vec::new(),
        }
    }
}

impl CacheSettings {
    /// Settings with caching switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_fallback_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.fallback_status_codes = codes;
        self
    }

    pub fn with_network_failure_fallback(mut self, enabled: bool) -> Self {
        self.fallback_on_network_failure = enabled;
        self
    }

    pub fn is_fallback_status(&self, status: u16) -> bool {
        self.fallback_status_codes.contains(&status)
    }
}
