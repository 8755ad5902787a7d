//! Caching strategies and the resolver that picks one per call
//!
//! | Strategy | Cache hit | Cache miss | Network failure |
//! |---|---|---|---|
//! | `CacheOnly` | return cached | `CacheMiss` error | n/a |
//! | `CacheFirst` | return cached | network, write back | propagate |
//! | `CacheThenNetwork` | return cached, refresh in background | network, write back | background failure logged |
//! | `StaleWhileRevalidate` | same as `CacheThenNetwork` | network, write back | background failure logged |
//! | `NetworkFirst` | not read up front | network, write back | fall back to cache |
//! | `NetworkOnly` | never read | network, never written | propagate |

use crate::request::HttpMethod;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheStrategy {
    CacheOnly,
    CacheFirst,
    CacheThenNetwork,
    StaleWhileRevalidate,
    NetworkFirst,
    NetworkOnly,
}

impl CacheStrategy {
    pub const ALL: [CacheStrategy; 6] = [
        CacheStrategy::CacheOnly,
        CacheStrategy::CacheFirst,
        CacheStrategy::CacheThenNetwork,
        CacheStrategy::StaleWhileRevalidate,
        CacheStrategy::NetworkFirst,
        CacheStrategy::NetworkOnly,
    ];

    /// Read the cache before going to the network
    pub fn should_check_cache(&self) -> bool {
        matches!(
            self,
            CacheStrategy::CacheOnly
                | CacheStrategy::CacheFirst
                | CacheStrategy::CacheThenNetwork
                | CacheStrategy::StaleWhileRevalidate
        )
    }

    pub fn should_make_network_call(&self) -> bool {
        !matches!(self, CacheStrategy::CacheOnly)
    }

    /// Successful network responses are written back
    pub fn writes_cache(&self) -> bool {
        !matches!(self, CacheStrategy::CacheOnly | CacheStrategy::NetworkOnly)
    }

    /// A hit schedules a detached refresh
    pub fn revalidates_in_background(&self) -> bool {
        matches!(
            self,
            CacheStrategy::CacheThenNetwork | CacheStrategy::StaleWhileRevalidate
        )
    }

    /// Network failures may be answered from the cache
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, CacheStrategy::NetworkOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::CacheOnly => "cacheOnly",
            CacheStrategy::CacheFirst => "cacheFirst",
            CacheStrategy::CacheThenNetwork => "cacheThenNetwork",
            CacheStrategy::StaleWhileRevalidate => "staleWhileRevalidate",
            CacheStrategy::NetworkFirst => "networkFirst",
            CacheStrategy::NetworkOnly => "networkOnly",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = String;

    /// Accepts camelCase, snake_case and kebab-case spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        CacheStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("unknown cache strategy: {}", s))
    }
}

/// Pick the strategy for a call
///
/// An explicit strategy always wins. Otherwise only GET requests are cached,
/// `use_cache = false` opts out, and `force_refresh` prefers the network while
/// keeping the cache as a fallback.
pub fn resolve(
    method: HttpMethod,
    explicit: Option<CacheStrategy>,
    use_cache: bool,
    force_refresh: bool,
) -> CacheStrategy {
    if let Some(strategy) = explicit {
        return strategy;
    }
    if method != HttpMethod::Get || !use_cache {
        return CacheStrategy::NetworkOnly;
    }
    if force_refresh {
        return CacheStrategy::NetworkFirst;
    }
    CacheStrategy::CacheFirst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_always_wins() {
        for strategy in CacheStrategy::ALL {
            assert_eq!(
                resolve(HttpMethod::Post, Some(strategy), false, true),
                strategy
            );
        }
    }

    #[test]
    fn test_legacy_flags() {
        assert_eq!(
            resolve(HttpMethod::Get, None, true, false),
            CacheStrategy::CacheFirst
        );
        assert_eq!(
            resolve(HttpMethod::Get, None, true, true),
            CacheStrategy::NetworkFirst
        );
        assert_eq!(
            resolve(HttpMethod::Get, None, false, true),
            CacheStrategy::NetworkOnly
        );
        for method in [
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
            HttpMethod::Head,
        ] {
            assert_eq!(resolve(method, None, true, false), CacheStrategy::NetworkOnly);
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(!CacheStrategy::CacheOnly.should_make_network_call());
        assert!(!CacheStrategy::NetworkFirst.should_check_cache());
        assert!(!CacheStrategy::NetworkOnly.writes_cache());
        assert!(!CacheStrategy::NetworkOnly.allows_fallback());
        assert!(CacheStrategy::StaleWhileRevalidate.revalidates_in_background());
        assert!(!CacheStrategy::CacheFirst.revalidates_in_background());
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "staleWhileRevalidate".parse::<CacheStrategy>(),
            Ok(CacheStrategy::StaleWhileRevalidate)
        );
        assert_eq!(
            "network-first".parse::<CacheStrategy>(),
            Ok(CacheStrategy::NetworkFirst)
        );
        assert_eq!(
            "CACHE_ONLY".parse::<CacheStrategy>(),
            Ok(CacheStrategy::CacheOnly)
        );
        assert!("sometimes".parse::<CacheStrategy>().is_err());

        for strategy in CacheStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<CacheStrategy>(), Ok(strategy));
        }
    }
}
