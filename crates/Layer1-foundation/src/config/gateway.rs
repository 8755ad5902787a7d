//! Gateway configuration - 통합 설정
//!
//! Domains, routes and cache settings loaded once by the host before the
//! first request. TOML and JSON files are both accepted.

use super::{CacheSettings, DomainConfig, RouteConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Project-level config file name
pub const GATEWAY_CONFIG_FILE: &str = "fetchgate.toml";

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Domain used when neither a route nor the call names one.
    /// Defaults to the first registered domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_domain: Option<String>,

    #[serde(default)]
    pub domains: Vec<DomainConfig>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Backoff unit for the retry stage (attempt n waits unit * 2^n)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self {
            retry_base_delay_ms: default_retry_base_delay_ms(),
            ..Default::default()
        }
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Load from a file; `.json` files are parsed as JSON, everything else as TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        debug!(
            "Loaded gateway config from {} ({} domains, {} routes)",
            path.display(),
            config.domains.len(),
            config.routes.len()
        );
        Ok(config)
    }

    /// Project file (`./fetchgate.toml`) first, then the global one
    /// (`<config_dir>/fetchgate/config.toml`)
    pub fn discover() -> Result<Self> {
        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                return Self::load(candidate);
            }
        }
        Err(Error::Config(format!(
            "No {} found in the current directory or global config directory",
            GATEWAY_CONFIG_FILE
        )))
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(GATEWAY_CONFIG_FILE));
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("fetchgate").join("config.toml"));
        }
        paths
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    // ========================================================================
    // Validation / accessors
    // ========================================================================

    /// Reject duplicate domains, dangling route targets and unknown defaults
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for domain in &self.domains {
            if !names.insert(domain.name.as_str()) {
                return Err(Error::Config(format!("Duplicate domain: {}", domain.name)));
            }
            if domain.base_url.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Domain '{}' has an empty base_url",
                    domain.name
                )));
            }
        }

        if let Some(default) = &self.default_domain {
            if !names.contains(default.as_str()) {
                return Err(Error::UnknownDomain(default.clone()));
            }
        }

        for route in &self.routes {
            if !names.contains(route.domain.as_str()) {
                return Err(Error::Config(format!(
                    "Route '{}' targets unknown domain '{}'",
                    route.pattern, route.domain
                )));
            }
        }

        Ok(())
    }

    pub fn default_domain_name(&self) -> Option<&str> {
        self.default_domain
            .as_deref()
            .or_else(|| self.domains.first().map(|d| d.name.as_str()))
    }

    pub fn domain(&self, name: &str) -> Option<&DomainConfig> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        default_domain = "api"
        retry_base_delay_ms = 250

        [[domains]]
        name = "api"
        base_url = "https://api.example.com"
        max_retries = 2

        [[domains]]
        name = "auth"
        base_url = "https://auth.example.com"

        [[routes]]
        pattern = "/login"
        domain = "auth"

        [[routes]]
        pattern = "/users/*"
        domain = "api"
        requires_auth = true

        [cache]
        default_ttl_secs = 120
    "#;

    #[test]
    fn test_parse_toml() {
        let config = GatewayConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.domains.len(), 2);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.default_domain_name(), Some("api"));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(250));
        assert_eq!(config.cache.default_ttl_secs, 120);
        assert!(config.routes[1].requires_auth);
        assert_eq!(config.domain("api").unwrap().max_retries, 2);
    }

    #[test]
    fn test_default_domain_falls_back_to_first() {
        let mut config = GatewayConfig::new();
        config
            .domains
            .push(DomainConfig::new("primary", "https://a.example.com"));
        config
            .domains
            .push(DomainConfig::new("secondary", "https://b.example.com"));

        assert_eq!(config.default_domain_name(), Some("primary"));
    }

    #[test]
    fn test_validate_rejects_dangling_route() {
        let mut config = GatewayConfig::new();
        config
            .domains
            .push(DomainConfig::new("api", "https://api.example.com"));
        config.routes.push(RouteConfig::new("/x", "missing"));

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_default() {
        let mut config = GatewayConfig::new();
        config
            .domains
            .push(DomainConfig::new("api", "https://api.example.com"));
        config.default_domain = Some("nope".to_string());

        assert!(matches!(config.validate(), Err(Error::UnknownDomain(_))));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let config = GatewayConfig::from_toml_str(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = GatewayConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
