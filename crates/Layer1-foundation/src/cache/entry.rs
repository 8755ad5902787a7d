//! Persisted cache entry

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Eviction priority recorded with each entry
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CachePriority {
    Low,
    #[default]
    Normal,
    High,
}

impl fmt::Display for CachePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePriority::Low => write!(f, "low"),
            CachePriority::Normal => write!(f, "normal"),
            CachePriority::High => write!(f, "high"),
        }
    }
}

impl FromStr for CachePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(CachePriority::Low),
            "normal" => Ok(CachePriority::Normal),
            "high" => Ok(CachePriority::High),
            other => Err(format!("unknown cache priority: {}", other)),
        }
    }
}

/// A cached response
///
/// Replaced whole on every write. Validity requires both the relative TTL and
/// the absolute expiry to hold; see [`CacheEntry::is_valid_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub data: Value,
    pub stored_at: DateTime<Utc>,
    /// Relative lifetime in milliseconds
    pub ttl_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: CachePriority,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl CacheEntry {
    /// Build an entry stored at `now`, computing `expires_at` from the TTL
    pub fn new(
        data: Value,
        now: DateTime<Utc>,
        ttl: Duration,
        priority: CachePriority,
        status_code: u16,
    ) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at = ChronoDuration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d));

        Self {
            data,
            stored_at: now,
            ttl_ms,
            expires_at,
            priority,
            status_code,
            headers: None,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        if !headers.is_empty() {
            self.headers = Some(headers);
        }
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Relative check: `now - stored_at <= ttl`
    pub fn within_ttl(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        match age.to_std() {
            Ok(age) => age <= self.ttl(),
            // stored in the future relative to this clock: not aged yet
            Err(_) => true,
        }
    }

    /// Absolute check: `expires_at` absent or `now <= expires_at`
    pub fn before_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now <= expires_at)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.within_ttl(now) && self.before_expiry(now)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_expiry_written_with_ttl() {
        let entry = CacheEntry::new(
            json!({"v": 1}),
            at(0),
            Duration::from_secs(60),
            CachePriority::Normal,
            200,
        );
        assert_eq!(entry.expires_at, Some(at(60)));
        assert_eq!(entry.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_dual_validity() {
        let mut entry = CacheEntry::new(
            json!(null),
            at(0),
            Duration::from_secs(60),
            CachePriority::Low,
            200,
        );
        assert!(entry.is_valid_at(at(60)));
        assert!(!entry.is_valid_at(at(61)));

        // absolute expiry earlier than the TTL wins
        entry.expires_at = Some(at(10));
        assert!(entry.within_ttl(at(30)));
        assert!(!entry.is_valid_at(at(30)));

        // no absolute expiry: TTL alone decides
        entry.expires_at = None;
        assert!(entry.is_valid_at(at(30)));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(CacheEntry::decode(r#"{"data": 1}"#).is_err());
        assert!(CacheEntry::decode("not json").is_err());
    }

    #[test]
    fn test_wire_names() {
        let entry = CacheEntry::new(
            json!("x"),
            at(0),
            Duration::from_secs(1),
            CachePriority::High,
            201,
        );
        let raw = entry.encode().unwrap();
        assert!(raw.contains("\"storedAt\""));
        assert!(raw.contains("\"statusCode\":201"));
        assert!(raw.contains("\"priority\":\"high\""));
        assert_eq!(CacheEntry::decode(&raw).unwrap(), entry);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("HIGH".parse::<CachePriority>(), Ok(CachePriority::High));
        assert!("urgent".parse::<CachePriority>().is_err());
    }
}
