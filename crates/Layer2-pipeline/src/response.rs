//! Pipeline results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Where the returned data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Cached data served because the network call failed
    Fallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub data: Value,
    pub source: ResponseSource,
    pub domain: String,
    pub path: String,
}

impl GatewayResponse {
    pub fn is_from_cache(&self) -> bool {
        matches!(self.source, ResponseSource::Cache | ResponseSource::Fallback)
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ResponseSource::Fallback
    }
}
