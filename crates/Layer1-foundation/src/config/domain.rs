//! Per-domain transport configuration

use crate::cache::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Transport settings for one remote domain
///
/// A domain is immutable once registered with a gateway; exactly one transport
/// is bound to it for the gateway's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name used by routes and per-call overrides (e.g. "api")
    pub name: String,

    /// Base address, e.g. `https://api.example.com/v1`
    pub base_url: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Headers attached to every request sent to this domain
    #[serde(default)]
    pub default_headers: HashMap<String, String>,

    /// Maximum number of retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Cache TTL for this domain; falls back to the global default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_receive_timeout_ms() -> u64 {
    30_000
}
fn default_send_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}

impl DomainConfig {
    /// Create a domain with default timeouts and retry count
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            receive_timeout_ms: default_receive_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            default_headers: HashMap::new(),
            max_retries: default_max_retries(),
            cache_ttl_secs: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = Some(ttl.as_secs());
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Lowercased `host[:port]`
    ///
    /// Base addresses that do not parse as URLs are used verbatim minus any
    /// scheme prefix, so keys stay stable even for odd test fixtures.
    pub fn host(&self) -> String {
        match Url::parse(&self.base_url) {
            Ok(url) => match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host.to_lowercase(), port),
                (Some(host), None) => host.to_lowercase(),
                _ => self.base_url.clone(),
            },
            Err(_) => self
                .base_url
                .split_once("://")
                .map(|(_, rest)| rest)
                .unwrap_or(&self.base_url)
                .trim_end_matches('/')
                .to_lowercase(),
        }
    }

    /// Cache key scope: `host[:port]` followed by the base path, if any
    pub fn key_scope(&self) -> String {
        let base = match Url::parse(&self.base_url) {
            Ok(url) if url.host_str().is_some() => normalize_path(url.path()),
            _ => return self.host(),
        };
        if base == "/" {
            self.host()
        } else {
            format!("{}{}", self.host(), base)
        }
    }

    /// Join the base address with a request path
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_extraction() {
        let domain = DomainConfig::new("api", "https://API.example.com/v1/");
        assert_eq!(domain.host(), "api.example.com");

        let with_port = DomainConfig::new("local", "http://localhost:8080");
        assert_eq!(with_port.host(), "localhost:8080");

        let bare = DomainConfig::new("bare", "not a url/");
        assert_eq!(bare.host(), "not a url");
    }

    #[test]
    fn test_key_scope_keeps_base_path() {
        let root = DomainConfig::new("api", "https://API.example.com/");
        assert_eq!(root.key_scope(), "api.example.com");

        let v1 = DomainConfig::new("v1", "https://api.example.com/v1/");
        let v2 = DomainConfig::new("v2", "https://api.example.com//v2");
        assert_eq!(v1.key_scope(), "api.example.com/v1");
        assert_eq!(v2.key_scope(), "api.example.com/v2");

        let with_port = DomainConfig::new("local", "http://localhost:8080/api");
        assert_eq!(with_port.key_scope(), "localhost:8080/api");
    }

    #[test]
    fn test_url_for() {
        let domain = DomainConfig::new("api", "https://api.example.com/v1/");
        assert_eq!(domain.url_for("/users"), "https://api.example.com/v1/users");
        assert_eq!(domain.url_for("users"), "https://api.example.com/v1/users");
    }

    #[test]
    fn test_defaults_from_toml() {
        let domain: DomainConfig = toml::from_str(
            r#"
            name = "api"
            base_url = "https://api.example.com"
            max_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(domain.max_retries, 1);
        assert_eq!(domain.connect_timeout(), Duration::from_secs(10));
        assert_eq!(domain.receive_timeout(), Duration::from_secs(30));
        assert!(domain.cache_ttl().is_none());
    }
}
