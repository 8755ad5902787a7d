//! Route configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized form of a route binding
///
/// `pattern` is either an exact path (`/users`), a prefix ending in `*`
/// (`/users/*`), or `*` to match everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub pattern: String,

    pub domain: String,

    #[serde(default)]
    pub requires_auth: bool,

    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl RouteConfig {
    pub fn new(pattern: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            domain: domain.into(),
            requires_auth: false,
            headers: HashMap::new(),
        }
    }

    pub fn with_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
