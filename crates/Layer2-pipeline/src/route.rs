//! Route matching
//!
//! Routes are evaluated in registration order; the first match wins. Paths
//! that match nothing go to the default domain without auth.

use fetchgate_foundation::{normalize_path, RouteConfig};
use std::collections::HashMap;
use tracing::trace;

/// Compiled route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// Matches one normalized path
    Exact(String),
    /// `prefix*`: matches paths starting with the prefix
    Prefix(String),
    /// `*`
    Any,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern == "*" {
            RoutePattern::Any
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            // request paths always start with `/`
            if prefix.starts_with('/') {
                RoutePattern::Prefix(prefix.to_string())
            } else {
                RoutePattern::Prefix(format!("/{}", prefix))
            }
        } else {
            RoutePattern::Exact(normalize_path(pattern))
        }
    }

    /// `path` must already be normalized and free of a query string
    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(exact) => exact == path,
            RoutePattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            RoutePattern::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Pattern as registered; used to address the route for patches
    pub pattern_source: String,
    pub pattern: RoutePattern,
    pub domain: String,
    pub requires_auth: bool,
    pub headers: HashMap<String, String>,
}

impl Route {
    pub fn new(pattern: impl Into<String>, domain: impl Into<String>) -> Self {
        let pattern_source = pattern.into();
        Self {
            pattern: RoutePattern::parse(&pattern_source),
            pattern_source,
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

impl From<&RouteConfig> for Route {
    fn from(config: &RouteConfig) -> Self {
        Route {
            pattern_source: config.pattern.clone(),
            pattern: RoutePattern::parse(&config.pattern),
            domain: config.domain.clone(),
            requires_auth: config.requires_auth,
            headers: config.headers.clone(),
        }
    }
}

/// Result of matching a request path
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub domain: String,
    pub requires_auth: bool,
    pub headers: HashMap<String, String>,
    /// Pattern of the matching route, `None` for the default fallthrough
    pub matched: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RouteMatcher {
    routes: Vec<Route>,
    default_domain: String,
}

impl RouteMatcher {
    pub fn new(default_domain: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            default_domain: default_domain.into(),
        }
    }

    pub fn register(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    /// Patch the auth flag of the route registered under `pattern`
    pub fn set_requires_auth(&mut self, pattern: &str, requires_auth: bool) -> bool {
        match self.find_mut(pattern) {
            Some(route) => {
                route.requires_auth = requires_auth;
                true
            }
            None => false,
        }
    }

    /// Merge headers into the route registered under `pattern`
    pub fn add_headers(&mut self, pattern: &str, headers: HashMap<String, String>) -> bool {
        match self.find_mut(pattern) {
            Some(route) => {
                route.headers.extend(headers);
                true
            }
            None => false,
        }
    }

    /// Resolve domain, auth requirement and route headers for a path
    ///
    /// A per-call domain override replaces only the domain; auth and headers
    /// still come from the matched route.
    pub fn resolve(&self, path: &str, domain_override: Option<&str>) -> ResolvedRoute {
        let raw_path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        let normalized = normalize_path(raw_path);

        let resolved = match self.routes.iter().find(|r| r.pattern.matches(&normalized)) {
            Some(route) => ResolvedRoute {
                domain: route.domain.clone(),
                requires_auth: route.requires_auth,
                headers: route.headers.clone(),
                matched: Some(route.pattern_source.clone()),
            },
            None => ResolvedRoute {
                domain: self.default_domain.clone(),
                requires_auth: false,
                headers: HashMap::new(),
                matched: None,
            },
        };

        trace!(
            "Route {} -> {} (pattern {:?})",
            normalized,
            resolved.domain,
            resolved.matched
        );

        match domain_override {
            Some(domain) => ResolvedRoute {
                domain: domain.to_string(),
                ..resolved
            },
            None => resolved,
        }
    }

    fn find_mut(&mut self, pattern: &str) -> Option<&mut Route> {
        self.routes
            .iter_mut()
            .find(|route| route.pattern_source == pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> RouteMatcher {
        let mut matcher = RouteMatcher::new("api");
        matcher.register(Route::new("/login", "auth"));
        matcher.register(
            Route::new("/users/*", "api")
                .with_auth(true)
                .with_header("X-Scope", "users"),
        );
        matcher.register(Route::new("/users/*", "legacy"));
        matcher.register(Route::new("/static*", "cdn"));
        matcher
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!(RoutePattern::parse("*"), RoutePattern::Any);
        assert_eq!(
            RoutePattern::parse("/v1/*"),
            RoutePattern::Prefix("/v1/".to_string())
        );
        assert_eq!(
            RoutePattern::parse("users/"),
            RoutePattern::Exact("/users".to_string())
        );
    }

    #[test]
    fn test_relative_prefix_gets_leading_slash() {
        assert_eq!(
            RoutePattern::parse("users/*"),
            RoutePattern::Prefix("/users/".to_string())
        );

        let mut m = RouteMatcher::new("api");
        m.register(Route::new("users/*", "accounts").with_auth(true));
        let resolved = m.resolve("/users/1", None);
        assert_eq!(resolved.domain, "accounts");
        assert!(resolved.requires_auth);
    }

    #[test]
    fn test_first_match_wins() {
        let resolved = matcher().resolve("/users/42", None);
        assert_eq!(resolved.domain, "api");
        assert!(resolved.requires_auth);
        assert_eq!(resolved.headers.get("X-Scope").map(String::as_str), Some("users"));
        assert_eq!(resolved.matched.as_deref(), Some("/users/*"));
    }

    #[test]
    fn test_exact_and_prefix() {
        let m = matcher();
        assert_eq!(m.resolve("/login", None).domain, "auth");
        assert_eq!(m.resolve("/login/", None).domain, "auth");
        assert_eq!(m.resolve("/login?next=/home", None).domain, "auth");
        assert_eq!(m.resolve("/login/extra", None).domain, "api");
        assert_eq!(m.resolve("/static/app.js", None).domain, "cdn");
        assert_eq!(m.resolve("/staticky", None).domain, "cdn");
    }

    #[test]
    fn test_default_fallthrough() {
        let resolved = matcher().resolve("/orders", None);
        assert_eq!(resolved.domain, "api");
        assert!(!resolved.requires_auth);
        assert!(resolved.matched.is_none());
    }

    #[test]
    fn test_wildcard_route() {
        let mut m = RouteMatcher::new("api");
        m.register(Route::new("*", "edge").with_auth(true));
        let resolved = m.resolve("/anything", None);
        assert_eq!(resolved.domain, "edge");
        assert!(resolved.requires_auth);
    }

    #[test]
    fn test_domain_override_keeps_route_auth() {
        let resolved = matcher().resolve("/users/1", Some("staging"));
        assert_eq!(resolved.domain, "staging");
        assert!(resolved.requires_auth);
    }

    #[test]
    fn test_runtime_patches() {
        let mut m = matcher();
        assert!(m.set_requires_auth("/login", true));
        assert!(m.add_headers(
            "/login",
            HashMap::from([("X-Client".to_string(), "cli".to_string())])
        ));
        assert!(!m.set_requires_auth("/missing", true));

        let resolved = m.resolve("/login", None);
        assert!(resolved.requires_auth);
        assert_eq!(resolved.headers.get("X-Client").map(String::as_str), Some("cli"));
    }
}
