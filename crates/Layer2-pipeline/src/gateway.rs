//! Gateway - strategy-driven request pipeline
//!
//! ```text
//! execute(request)
//!   ├── route + strategy resolution
//!   ├── cache lookup ──── hit ──► return (maybe spawn background refresh)
//!   ├── auth stage
//!   │     └── retry stage
//!   │           └── transport (bounded by timeout)
//!   ├── 2xx ──► write back / evict on mutation
//!   └── failure ──► fallback to cache when policy allows
//! ```
//!
//! A `Gateway` is cheap to clone; clones share domains, routes, the cache
//! store and the background task tracker.

use crate::auth::{bearer, AuthHandler, AuthStage, AUTHORIZATION_HEADER};
use crate::error::{ErrorKind, GatewayError, TransportError};
use crate::observer::GatewayObserver;
use crate::request::{ApiRequest, HttpMethod, RequestContext};
use crate::response::{GatewayResponse, ResponseSource};
use crate::retry::{with_retry, RetryConfig};
use crate::route::{Route, RouteMatcher};
use crate::strategy::{self, CacheStrategy};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
use fetchgate_foundation::{
    CacheEntry, CacheKey, CacheSettings, CacheStats, CacheStore, Clock, DomainConfig, Error,
    GatewayConfig, KvBackend, MatchMode, Result, SystemClock,
};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use url::form_urlencoded;

// ============================================================================
// Internal types
// ============================================================================

/// A registered domain with its transport
struct DomainEntry {
    config: DomainConfig,
    /// Cached `config.key_scope()`
    scope: String,
    transport: Arc<dyn Transport>,
}

/// Result of the cache lookup step
enum CacheLookup {
    Hit(CacheEntry),
    Miss,
}

struct GatewayInner {
    domains: HashMap<String, DomainEntry>,
    routes: RwLock<RouteMatcher>,
    cache: CacheStore,
    settings: CacheSettings,
    auth: AuthStage,
    observers: Vec<Arc<dyn GatewayObserver>>,
    retry_base_delay: Duration,
    background: TaskTracker,
    cancel: CancellationToken,
}

/// Which cache entries [`Gateway::clear_cache`] removes
///
/// Set fields are combined; an empty filter clears everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheFilter {
    pub domain: Option<String>,
    pub method: Option<HttpMethod>,
    /// Substring of the full key
    pub pattern: Option<String>,
}

impl CacheFilter {
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_none() && self.method.is_none() && self.pattern.is_none()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Gateway`]
///
/// Domains added without a transport get an [`HttpTransport`] at build time.
#[derive(Default)]
pub struct GatewayBuilder {
    domains: Vec<(DomainConfig, Option<Arc<dyn Transport>>)>,
    default_domain: Option<String>,
    routes: Vec<Route>,
    settings: CacheSettings,
    backend: Option<Arc<dyn KvBackend>>,
    clock: Option<Arc<dyn Clock>>,
    auth: Option<Arc<dyn AuthHandler>>,
    observers: Vec<Arc<dyn GatewayObserver>>,
    retry_base_delay: Option<Duration>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-populated from a loaded configuration
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut builder = Self::new()
            .cache_settings(config.cache.clone())
            .retry_base_delay(config.retry_base_delay());
        for domain in &config.domains {
            builder = builder.domain(domain.clone());
        }
        if let Some(name) = &config.default_domain {
            builder = builder.default_domain(name.clone());
        }
        for route in &config.routes {
            builder = builder.route(Route::from(route));
        }
        builder
    }

    /// Domain served over HTTP
    pub fn domain(mut self, config: DomainConfig) -> Self {
        self.domains.push((config, None));
        self
    }

    /// Domain served by a custom transport
    pub fn domain_with_transport(
        mut self,
        config: DomainConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.domains.push((config, Some(transport)));
        self
    }

    pub fn default_domain(mut self, name: impl Into<String>) -> Self {
        self.default_domain = Some(name.into());
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn cache_settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Storage for cached responses (in-memory when unset)
    pub fn backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn auth_handler(mut self, handler: Arc<dyn AuthHandler>) -> Self {
        self.auth = Some(handler);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn GatewayObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Backoff unit of the retry stage
    pub fn retry_base_delay(mut self, unit: Duration) -> Self {
        self.retry_base_delay = Some(unit);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        if self.domains.is_empty() {
            return Err(Error::config("at least one domain is required"));
        }

        let mut domains = HashMap::new();
        let mut first_domain = None;
        for (config, transport) in self.domains {
            if config.name.trim().is_empty() {
                return Err(Error::config("domain name must not be empty"));
            }
            if domains.contains_key(&config.name) {
                return Err(Error::Config(format!("duplicate domain '{}'", config.name)));
            }
            let transport = match transport {
                Some(transport) => transport,
                None => Arc::new(HttpTransport::new(config.clone())?) as Arc<dyn Transport>,
            };
            first_domain.get_or_insert_with(|| config.name.clone());
            domains.insert(
                config.name.clone(),
                DomainEntry {
                    scope: config.key_scope(),
                    config,
                    transport,
                },
            );
        }

        let default_domain = match self.default_domain.or(first_domain) {
            Some(name) if domains.contains_key(&name) => name,
            Some(name) => return Err(Error::UnknownDomain(name)),
            None => return Err(Error::config("no default domain")),
        };

        let mut routes = RouteMatcher::new(default_domain.clone());
        for route in self.routes {
            if !domains.contains_key(&route.domain) {
                return Err(Error::Config(format!(
                    "route '{}' targets unknown domain '{}'",
                    route.pattern_source, route.domain
                )));
            }
            routes.register(route);
        }

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(fetchgate_foundation::MemoryBackend::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        info!(
            "Gateway ready: {} domain(s), default '{}', cache {}",
            domains.len(),
            default_domain,
            if self.settings.enabled { "on" } else { "off" }
        );

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                domains,
                routes: RwLock::new(routes),
                cache: CacheStore::with_clock(backend, clock),
                settings: self.settings,
                auth: AuthStage::new(self.auth),
                observers: self.observers,
                retry_base_delay: self
                    .retry_base_delay
                    .unwrap_or_else(|| Duration::from_secs(1)),
                background: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        })
    }
}

// ============================================================================
// Gateway
// ============================================================================

#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// HTTP gateway with an in-memory cache, built from configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        GatewayBuilder::from_config(config).build()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    pub fn default_domain(&self) -> String {
        self.inner.routes.read().default_domain().to_string()
    }

    /// Registered domain names, sorted
    pub fn domains(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.domains.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run one call through the pipeline
    pub async fn execute(&self, request: ApiRequest) -> std::result::Result<GatewayResponse, GatewayError> {
        self.run(request, false).await
    }

    async fn run(
        &self,
        request: ApiRequest,
        background: bool,
    ) -> std::result::Result<GatewayResponse, GatewayError> {
        let route = self
            .inner
            .routes
            .read()
            .resolve(&request.path, request.domain.as_deref());
        let domain = self.inner.domains.get(&route.domain).ok_or_else(|| {
            GatewayError::new(
                ErrorKind::Unknown,
                format!("Unknown domain: {}", route.domain),
                route.domain.clone(),
                request.path.clone(),
            )
        })?;

        let mut headers = domain.config.default_headers.clone();
        headers.extend(route.headers.clone());
        headers.extend(request.headers.clone());

        let strategy = strategy::resolve(
            request.method,
            request.strategy,
            request.use_cache,
            request.force_refresh,
        );
        let header_pairs: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let key = CacheKey::build(
            request.method.as_str(),
            &domain.scope,
            &request.path,
            &request.query,
            &header_pairs,
            &self.inner.settings.key_headers,
        );

        let mut ctx = RequestContext::new(strategy, key, &request);
        if background {
            ctx = ctx.for_background();
        }
        self.notify(|o| o.on_request(&request, &ctx));

        let settings = &self.inner.settings;
        let read = request.method.is_read();

        // Cache lookup
        if !ctx.background_refresh {
            let lookup_allowed = settings.enabled
                && read
                && strategy.should_check_cache()
                && (!ctx.force_refresh || strategy == CacheStrategy::CacheOnly);

            let lookup = if lookup_allowed {
                self.lookup(&ctx.cache_key).await
            } else {
                CacheLookup::Miss
            };

            match lookup {
                CacheLookup::Hit(entry) => {
                    debug!("[{}] cache hit ({}): {}", ctx.request_id, strategy, ctx.cache_key);
                    let response = cached_response(entry, ResponseSource::Cache, &route.domain, &request.path);
                    self.notify(|o| o.on_cached_response(&response, &ctx));
                    if strategy.revalidates_in_background() {
                        self.spawn_refresh(request);
                    }
                    return Ok(response);
                }
                CacheLookup::Miss if strategy == CacheStrategy::CacheOnly => {
                    debug!("[{}] cache miss (cacheOnly): {}", ctx.request_id, ctx.cache_key);
                    let err = GatewayError::cache_miss(&route.domain, &request.path);
                    self.notify(|o| o.on_error(&err, &ctx));
                    return Err(err);
                }
                CacheLookup::Miss => {
                    if lookup_allowed {
                        debug!("[{}] cache miss: {}", ctx.request_id, ctx.cache_key);
                    }
                }
            }
        }

        // Network
        let requires_auth = request.requires_auth.unwrap_or(route.requires_auth);
        let result = self
            .send(domain, &request, &headers, requires_auth, &mut ctx)
            .await;

        match result {
            Ok(raw) => {
                let response = GatewayResponse {
                    status: raw.status,
                    headers: raw.headers,
                    data: raw.body,
                    source: ResponseSource::Network,
                    domain: route.domain.clone(),
                    path: request.path.clone(),
                };

                if settings.enabled && read && (strategy.writes_cache() || ctx.background_refresh) {
                    self.write_back(domain, &request, &ctx, &response).await;
                }
                if request.method.is_mutating() {
                    self.evict_scope(domain, &request.path).await;
                }

                self.notify(|o| o.on_response(&response, &ctx));
                Ok(response)
            }
            Err(err) => {
                if !ctx.background_refresh
                    && settings.enabled
                    && strategy.allows_fallback()
                    && self.qualifies_for_fallback(&err)
                {
                    if let CacheLookup::Hit(entry) = self.lookup(&ctx.cache_key).await {
                        info!(
                            "[{}] serving cached fallback for {} {}: {}",
                            ctx.request_id, request.method, request.path, err
                        );
                        let response = cached_response(entry, ResponseSource::Fallback, &route.domain, &request.path);
                        self.notify(|o| o.on_cached_response(&response, &ctx));
                        return Ok(response);
                    }
                }
                self.notify(|o| o.on_error(&err, &ctx));
                Err(err)
            }
        }
    }

    /// Auth stage wrapping the retry stage wrapping the transport
    async fn send(
        &self,
        domain: &DomainEntry,
        request: &ApiRequest,
        headers: &HashMap<String, String>,
        requires_auth: bool,
        ctx: &mut RequestContext,
    ) -> std::result::Result<TransportResponse, GatewayError> {
        let (path, query) = split_query(&request.path, &request.query);
        let retry = RetryConfig::exponential(domain.config.max_retries, self.inner.retry_base_delay);
        let operation = format!("{} {}{}", request.method, domain.config.name, path);
        let timeout = ctx.timeout;
        let limit = timeout.unwrap_or_else(|| {
            let config = &domain.config;
            config.connect_timeout() + config.send_timeout() + config.receive_timeout()
        });
        let attempts = AtomicU32::new(0);

        let result = self
            .inner
            .auth
            .execute(requires_auth, &domain.config.name, &request.path, |token| {
                let mut headers = headers.clone();
                if let Some(token) = token {
                    headers.insert(AUTHORIZATION_HEADER.to_string(), bearer(&token));
                }
                let prepared = TransportRequest {
                    method: request.method,
                    path: path.clone(),
                    query: query.clone(),
                    headers,
                    body: request.body.clone(),
                    timeout,
                };
                let retry = &retry;
                let operation = &operation;
                let attempts = &attempts;
                async move {
                    with_retry(retry, operation, |attempt| {
                        attempts.store(attempt, Ordering::Relaxed);
                        self.call_transport(domain, prepared.clone(), limit, &request.path)
                    })
                    .await
                }
            })
            .await;

        ctx.retry_count = attempts.load(Ordering::Relaxed);
        result
    }

    async fn call_transport(
        &self,
        domain: &DomainEntry,
        request: TransportRequest,
        limit: Duration,
        path: &str,
    ) -> std::result::Result<TransportResponse, GatewayError> {
        let name = domain.config.name.as_str();
        let response = match tokio::time::timeout(limit, domain.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(GatewayError::from_transport(&err, name, path)),
            Err(_) => {
                return Err(GatewayError::from_transport(
                    &TransportError::ReceiveTimeout,
                    name,
                    path,
                ))
            }
        };

        if response.is_success() {
            Ok(response)
        } else {
            Err(GatewayError::from_status(response.status, response.body, name, path))
        }
    }

    // ========================================================================
    // Cache steps
    // ========================================================================

    async fn lookup(&self, key: &CacheKey) -> CacheLookup {
        match self.inner.cache.get(key).await {
            Ok(Some(entry)) => CacheLookup::Hit(entry),
            Ok(None) => CacheLookup::Miss,
            Err(e) if e.is_storage() => {
                warn!("Cache backend unavailable for {}, treating as miss: {}", key, e);
                CacheLookup::Miss
            }
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", key, e);
                CacheLookup::Miss
            }
        }
    }

    async fn write_back(
        &self,
        domain: &DomainEntry,
        request: &ApiRequest,
        ctx: &RequestContext,
        response: &GatewayResponse,
    ) {
        let settings = &self.inner.settings;
        let ttl = ctx
            .max_stale
            .or_else(|| domain.config.cache_ttl())
            .unwrap_or_else(|| settings.default_ttl());
        let priority = request.priority.unwrap_or(settings.default_priority);

        if let Err(e) = self
            .inner
            .cache
            .put(
                &ctx.cache_key,
                response.data.clone(),
                ttl,
                priority,
                response.status,
                response.headers.clone(),
            )
            .await
        {
            warn!("Cache write failed for {}: {}", ctx.cache_key, e);
        }
    }

    /// Drop cached reads of a resource after it was mutated
    async fn evict_scope(&self, domain: &DomainEntry, path: &str) {
        let pattern = CacheKey::scope_pattern(&domain.scope, path);
        match self
            .inner
            .cache
            .delete_by_pattern(&pattern, MatchMode::Contains)
            .await
        {
            Ok(0) => {}
            Ok(n) => debug!("Evicted {} entries under {}", n, pattern),
            Err(e) => warn!("Cache eviction failed for {}: {}", pattern, e),
        }
    }

    fn qualifies_for_fallback(&self, err: &GatewayError) -> bool {
        let settings = &self.inner.settings;
        (settings.fallback_on_network_failure && err.kind.is_network_failure())
            || err
                .status_code
                .is_some_and(|status| settings.is_fallback_status(status))
    }

    // ========================================================================
    // Background refresh
    // ========================================================================

    fn spawn_refresh(&self, request: ApiRequest) {
        let task = self.background_refresh(request);
        self.inner.background.spawn(task);
    }

    fn background_refresh(&self, request: ApiRequest) -> BoxFuture<'static, ()> {
        let gateway = self.clone();
        let cancel = self.inner.cancel.clone();
        Box::pin(async move {
            let path = request.path.clone();
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Background refresh of {} cancelled", path);
                }
                result = gateway.run(request, true) => {
                    if let Err(e) = result {
                        warn!("Background refresh of {} failed: {}", path, e);
                    }
                }
            }
        })
    }

    /// Wait until every background refresh started so far has finished
    pub async fn settle(&self) {
        let tracker = &self.inner.background;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }

    /// Cancel in-flight background refreshes and wait for them to stop
    pub async fn shutdown(&self) {
        info!("Gateway shutting down");
        self.inner.cancel.cancel();
        self.inner.background.close();
        self.inner.background.wait().await;
    }

    /// Number of background refreshes still running
    pub fn pending_refreshes(&self) -> usize {
        self.inner.background.len()
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Remove cached entries matching every set field of `filter`
    pub async fn clear_cache(&self, filter: &CacheFilter) -> Result<usize> {
        if filter.is_empty() {
            return self.clear_all_cache().await;
        }

        let owner = match &filter.domain {
            Some(name) => Some(
                self.inner
                    .domains
                    .get(name)
                    .ok_or_else(|| Error::UnknownDomain(name.clone()))?,
            ),
            None => None,
        };

        let cache = &self.inner.cache;
        let mut removed = 0;
        for raw in cache.list_keys("").await? {
            let matches = owner.map_or(true, |entry| self.owns_key(entry, &raw))
                && filter
                    .method
                    .map_or(true, |m| CacheKey::method_of(&raw) == Some(m.as_str()))
                && filter.pattern.as_deref().map_or(true, |p| raw.contains(p));
            if matches && cache.delete(&CacheKey::from_raw(raw)).await? {
                removed += 1;
            }
        }
        info!("Cleared {} cache entries ({:?})", removed, filter);
        Ok(removed)
    }

    /// A key belongs to the domain with the longest scope that contains it
    fn owns_key(&self, entry: &DomainEntry, raw: &str) -> bool {
        CacheKey::in_scope(raw, &entry.scope)
            && !self.inner.domains.values().any(|other| {
                other.scope.len() > entry.scope.len() && CacheKey::in_scope(raw, &other.scope)
            })
    }

    pub async fn clear_expired_cache(&self) -> Result<usize> {
        let removed = self.inner.cache.clear_expired().await?;
        info!("Cleared {} expired cache entries", removed);
        Ok(removed)
    }

    pub async fn clear_all_cache(&self) -> Result<usize> {
        let removed = self.inner.cache.clear_all().await?;
        info!("Cleared all {} cache entries", removed);
        Ok(removed)
    }

    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.inner.cache.stats().await
    }

    /// Cache keys under `prefix` (relative to the key namespace, e.g. `"GET:"`)
    pub async fn cache_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.cache.list_keys(prefix).await
    }

    // ========================================================================
    // Routes
    // ========================================================================

    /// Returns false when no route was registered with `pattern`
    pub fn set_route_auth(&self, pattern: &str, requires_auth: bool) -> bool {
        self.inner.routes.write().set_requires_auth(pattern, requires_auth)
    }

    pub fn add_route_headers(&self, pattern: &str, headers: HashMap<String, String>) -> bool {
        self.inner.routes.write().add_headers(pattern, headers)
    }

    pub fn register_route(&self, route: Route) -> Result<()> {
        if !self.inner.domains.contains_key(&route.domain) {
            return Err(Error::UnknownDomain(route.domain));
        }
        self.inner.routes.write().register(route);
        Ok(())
    }

    fn notify(&self, event: impl Fn(&dyn GatewayObserver)) {
        for observer in &self.inner.observers {
            event(observer.as_ref());
        }
    }
}

fn cached_response(
    entry: CacheEntry,
    source: ResponseSource,
    domain: &str,
    path: &str,
) -> GatewayResponse {
    GatewayResponse {
        status: entry.status_code,
        headers: entry.headers.unwrap_or_default(),
        data: entry.data,
        source,
        domain: domain.to_string(),
        path: path.to_string(),
    }
}

/// Separate an inline query string from the path and merge it with `query`
fn split_query(path: &str, query: &[(String, String)]) -> (String, Vec<(String, String)>) {
    match path.split_once('?') {
        Some((raw_path, inline)) => {
            let mut merged: Vec<(String, String)> = form_urlencoded::parse(inline.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            merged.extend(query.iter().cloned());
            (raw_path.to_string(), merged)
        }
        None => (path.to_string(), query.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            Ok(TransportResponse::ok(json!({
                "path": request.path,
                "query": request.query,
                "auth": request.header("authorization"),
            })))
        }
    }

    fn gateway() -> Gateway {
        Gateway::builder()
            .domain_with_transport(DomainConfig::new("api", "https://api.example.com"), Arc::new(Echo))
            .domain_with_transport(DomainConfig::new("auth", "https://auth.example.com"), Arc::new(Echo))
            .route(Route::new("/login", "auth"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_split_query() {
        let (path, query) = split_query("/search?q=rust&page=2", &[("sort".into(), "asc".into())]);
        assert_eq!(path, "/search");
        assert_eq!(
            query,
            vec![
                ("q".to_string(), "rust".to_string()),
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_builder_validation() {
        assert!(Gateway::builder().build().is_err());

        let err = Gateway::builder()
            .domain_with_transport(DomainConfig::new("api", "https://a"), Arc::new(Echo))
            .default_domain("missing")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownDomain(_)));

        let err = Gateway::builder()
            .domain_with_transport(DomainConfig::new("api", "https://a"), Arc::new(Echo))
            .route(Route::new("/x", "nowhere"))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_routes_to_matched_domain() {
        let gateway = gateway();
        assert_eq!(gateway.default_domain(), "api");
        assert_eq!(gateway.domains(), vec!["api", "auth"]);

        let response = gateway.execute(ApiRequest::post("/login", json!({}))).await.unwrap();
        assert_eq!(response.domain, "auth");

        let response = gateway.execute(ApiRequest::get("/users?page=1")).await.unwrap();
        assert_eq!(response.domain, "api");
        assert_eq!(response.data["path"], "/users");
        assert_eq!(response.data["query"], json!([["page", "1"]]));
    }

    #[tokio::test]
    async fn test_unknown_domain_override() {
        let err = gateway()
            .execute(ApiRequest::get("/users").domain("billing"))
            .await
            .unwrap_err();
        assert!(err.message.contains("billing"));
    }

    #[tokio::test]
    async fn test_route_patching() {
        let gateway = gateway();
        assert!(!gateway.set_route_auth("/nope", true));
        assert!(gateway.register_route(Route::new("/x", "nowhere")).is_err());

        gateway
            .register_route(Route::new("/admin/*", "api").with_auth(true))
            .unwrap();
        let err = gateway.execute(ApiRequest::get("/admin/users")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthenticationRequired);

        assert!(gateway.set_route_auth("/admin/*", false));
        assert!(gateway.execute(ApiRequest::get("/admin/users")).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_cache_filters() {
        let gateway = gateway();
        gateway.execute(ApiRequest::get("/users")).await.unwrap();
        gateway.execute(ApiRequest::get("/posts")).await.unwrap();
        gateway
            .execute(ApiRequest::get("/token").domain("auth"))
            .await
            .unwrap();
        assert_eq!(gateway.cache_keys("").await.unwrap().len(), 3);

        let removed = gateway
            .clear_cache(&CacheFilter::default().domain("api").pattern("/users"))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let removed = gateway
            .clear_cache(&CacheFilter::default().method(HttpMethod::Head))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = gateway
            .clear_cache(&CacheFilter::default().method(HttpMethod::Get))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        assert!(gateway
            .clear_cache(&CacheFilter::default().domain("billing"))
            .await
            .is_err());
    }
}
