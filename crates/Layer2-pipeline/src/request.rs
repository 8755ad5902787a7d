//! Per-call request description and call-scoped context

use crate::strategy::CacheStrategy;
use fetchgate_foundation::{CacheKey, CachePriority};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Safe, idempotent reads whose responses may be cached
    pub fn is_read(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head)
    }

    /// Methods that invalidate cached reads of the same resource
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

/// One outgoing call as described by the caller
///
/// ```rust,ignore
/// let request = ApiRequest::get("/users")
///     .query("page", "2")
///     .strategy(CacheStrategy::StaleWhileRevalidate)
///     .max_stale(Duration::from_secs(600));
/// let response = gateway.execute(request).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    /// Overrides the domain chosen by the route matcher
    pub domain: Option<String>,
    pub query: Vec<(String, String)>,
    /// Merged over domain and route headers
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    /// Explicit strategy; wins over the legacy flags below
    pub strategy: Option<CacheStrategy>,
    pub use_cache: bool,
    pub force_refresh: bool,
    /// TTL for the written entry, overriding domain and global defaults
    pub max_stale: Option<Duration>,
    /// Bounds the transport call only
    pub timeout: Option<Duration>,
    pub priority: Option<CachePriority>,
    /// Overrides the route's auth requirement for this call
    pub requires_auth: Option<bool>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            domain: None,
            query: Vec::new(),
            headers: HashMap::new(),
            body: None,
            strategy: None,
            use_cache: true,
            force_refresh: false,
            max_stale: None,
            timeout: None,
            priority: None,
            requires_auth: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path).body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn max_stale(mut self, max_stale: Duration) -> Self {
        self.max_stale = Some(max_stale);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn priority(mut self, priority: CachePriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = Some(requires_auth);
        self
    }
}

/// Call-scoped state threaded through the pipeline stages
///
/// Created at call entry and dropped when the call completes; never stored.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlates log lines of one call (and its background refresh)
    pub request_id: Uuid,
    pub strategy: CacheStrategy,
    pub cache_key: CacheKey,
    pub force_refresh: bool,
    pub max_stale: Option<Duration>,
    pub timeout: Option<Duration>,
    /// Retries performed by the retry stage (0 when the first try settled it)
    pub retry_count: u32,
    /// Set only on detached revalidation calls; skips all cache reads
    pub background_refresh: bool,
}

impl RequestContext {
    pub fn new(strategy: CacheStrategy, cache_key: CacheKey, request: &ApiRequest) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            strategy,
            cache_key,
            force_refresh: request.force_refresh,
            max_stale: request.max_stale,
            timeout: request.timeout,
            retry_count: 0,
            background_refresh: false,
        }
    }

    pub fn for_background(mut self) -> Self {
        self.background_refresh = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_classes() {
        assert!(HttpMethod::Get.is_read());
        assert!(!HttpMethod::Get.is_mutating());
        assert!(HttpMethod::Delete.is_mutating());
        assert!(!HttpMethod::Options.is_read());
        assert!(!HttpMethod::Options.is_mutating());
        assert_eq!("patch".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert!("BREW".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_builder() {
        let request = ApiRequest::post("/users", json!({"name": "ada"}))
            .domain("api")
            .query("notify", "true")
            .header("X-Request-Source", "test")
            .timeout(Duration::from_secs(5))
            .requires_auth(true);

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.domain.as_deref(), Some("api"));
        assert_eq!(request.query, vec![("notify".into(), "true".into())]);
        assert_eq!(request.body, Some(json!({"name": "ada"})));
        assert!(request.use_cache);
        assert_eq!(request.requires_auth, Some(true));
    }
}
