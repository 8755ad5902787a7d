//! Cache key construction
//!
//! Keys must be identical for logically identical requests in every process
//! that shares a backend, so only stable encodings are used here (no
//! `DefaultHasher`, whose seed is per-process).

use sha2::{Digest, Sha256};
use std::fmt;
use url::form_urlencoded;

/// Namespace shared by every key the gateway writes
pub const CACHE_KEY_PREFIX: &str = "http_cache:";

/// Number of hex characters kept from the header digest
const HEADER_DIGEST_LEN: usize = 16;

/// Deterministic cache key
///
/// Layout: `http_cache:<METHOD>:<scope><path>[?<sorted query>][#h=<digest>]`
///
/// `scope` is the domain's `host[:port]` followed by its base path, if any,
/// so domains sharing a host under different base paths never share keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from request parts
    ///
    /// `path` may carry an inline query string; it is merged with `query`
    /// before sorting. Headers only contribute when their (case-insensitive)
    /// name appears in `key_headers`.
    pub fn build(
        method: &str,
        scope: &str,
        path: &str,
        query: &[(String, String)],
        headers: &[(String, String)],
        key_headers: &[String],
    ) -> Self {
        let (raw_path, inline_query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let mut params: Vec<(String, String)> = query.to_vec();
        if let Some(inline) = inline_query {
            params.extend(
                form_urlencoded::parse(inline.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned())),
            );
        }
        params.sort();

        let mut key = format!(
            "{}{}:{}{}",
            CACHE_KEY_PREFIX,
            method.trim().to_ascii_uppercase(),
            normalize_scope(scope),
            normalize_path(raw_path)
        );

        if !params.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish();
            key.push('?');
            key.push_str(&encoded);
        }

        if let Some(digest) = header_digest(headers, key_headers) {
            key.push_str("#h=");
            key.push_str(&digest);
        }

        CacheKey(key)
    }

    /// Wrap an already-built key string
    pub fn from_raw(raw: impl Into<String>) -> Self {
        CacheKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Method segment of a key, if it carries the gateway namespace
    pub fn method_of(raw: &str) -> Option<&str> {
        raw.strip_prefix(CACHE_KEY_PREFIX)?
            .split_once(':')
            .map(|(method, _)| method)
    }

    /// Whether `raw` was built under `scope` (exact scope, then a path)
    ///
    /// A key under `api.example.com/v1` is also in scope of
    /// `api.example.com`; callers owning several scopes on one host pick the
    /// longest match.
    pub fn in_scope(raw: &str, scope: &str) -> bool {
        let body = match raw
            .strip_prefix(CACHE_KEY_PREFIX)
            .and_then(|rest| rest.split_once(':'))
        {
            Some((_, body)) => body,
            None => return false,
        };
        body.strip_prefix(normalize_scope(scope).as_str())
            .is_some_and(|tail| tail.starts_with('/'))
    }

    /// Substring matching every key of a scope + path and anything below it.
    /// Used to clear cached reads after a mutating call.
    pub fn scope_pattern(scope: &str, path: &str) -> String {
        let raw_path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        format!(":{}{}", normalize_scope(scope), normalize_path(raw_path))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Leading slash, no empty segments, no trailing slash (root stays `/`)
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Lowercase authority, normalized base path without a trailing slash
fn normalize_scope(scope: &str) -> String {
    let scope = scope.trim().trim_end_matches('/');
    match scope.split_once('/') {
        Some((authority, base)) => {
            format!("{}{}", authority.to_ascii_lowercase(), normalize_path(base))
        }
        None => scope.to_ascii_lowercase(),
    }
}

fn header_digest(headers: &[(String, String)], key_headers: &[String]) -> Option<String> {
    if key_headers.is_empty() {
        return None;
    }

    let mut selected: Vec<(String, &str)> = headers
        .iter()
        .filter(|(name, _)| key_headers.iter().any(|k| k.eq_ignore_ascii_case(name)))
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
        .collect();
    if selected.is_empty() {
        return None;
    }
    selected.sort();

    let mut hasher = Sha256::new();
    for (name, value) in &selected {
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());
    Some(digest[..HEADER_DIGEST_LEN].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn key(method: &str, path: &str, query: &[(&str, &str)]) -> CacheKey {
        CacheKey::build(method, "api.example.com", path, &q(query), &[], &[])
    }

    #[test]
    fn test_key_layout() {
        let k = key("get", "/users", &[("page", "2")]);
        assert_eq!(k.as_str(), "http_cache:GET:api.example.com/users?page=2");
    }

    #[test]
    fn test_query_order_does_not_matter() {
        let a = key("GET", "/users", &[("b", "2"), ("a", "1")]);
        let b = key("GET", "/users", &[("a", "1"), ("b", "2")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_inline_query_equals_explicit_query() {
        let inline = key("GET", "/users?b=2&a=1", &[]);
        let explicit = key("GET", "/users", &[("a", "1"), ("b", "2")]);
        let mixed = key("GET", "/users?b=2", &[("a", "1")]);
        assert_eq!(inline, explicit);
        assert_eq!(mixed, explicit);
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(key("GET", "users/", &[]), key("GET", "/users", &[]));
        assert_eq!(key("GET", "//users//1", &[]), key("GET", "/users/1", &[]));
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_distinct_requests_do_not_collide() {
        // values containing separators must not alias other parameter sets
        let tricky = key("GET", "/s", &[("a", "1&b=2")]);
        let plain = key("GET", "/s", &[("a", "1"), ("b", "2")]);
        assert_ne!(tricky, plain);

        assert_ne!(key("GET", "/users", &[]), key("POST", "/users", &[]));
        assert_ne!(key("GET", "/users", &[]), key("GET", "/users/1", &[]));
        assert_ne!(
            key("GET", "/users", &[("page", "1")]),
            key("GET", "/users", &[("page", "2")])
        );
        assert_ne!(
            CacheKey::build("GET", "a.example.com", "/x", &[], &[], &[]),
            CacheKey::build("GET", "b.example.com", "/x", &[], &[], &[])
        );
    }

    #[test]
    fn test_headers_only_count_when_whitelisted() {
        let headers = q(&[("Accept-Language", "de"), ("X-Trace", "123")]);
        let other = q(&[("Accept-Language", "de"), ("X-Trace", "456")]);
        let whitelist = vec!["accept-language".to_string()];

        let without = CacheKey::build("GET", "h", "/p", &[], &headers, &[]);
        assert_eq!(without.as_str(), "http_cache:GET:h/p");

        let a = CacheKey::build("GET", "h", "/p", &[], &headers, &whitelist);
        let b = CacheKey::build("GET", "h", "/p", &[], &other, &whitelist);
        assert_eq!(a, b);
        assert!(a.as_str().contains("#h="));

        let english = q(&[("accept-language", "en")]);
        let c = CacheKey::build("GET", "h", "/p", &[], &english, &whitelist);
        assert_ne!(a, c);
    }

    #[test]
    fn test_base_path_is_part_of_scope() {
        let v1 = CacheKey::build("GET", "api.example.com/v1", "/users", &[], &[], &[]);
        let v2 = CacheKey::build("GET", "api.example.com/v2", "/users", &[], &[], &[]);
        assert_ne!(v1, v2);
        assert_eq!(v1.as_str(), "http_cache:GET:api.example.com/v1/users");

        let messy = CacheKey::build("GET", "API.example.com//v1/", "users", &[], &[], &[]);
        assert_eq!(messy, v1);
    }

    #[test]
    fn test_patterns() {
        let k = key("GET", "/users/7", &[("x", "1")]);
        assert!(k
            .as_str()
            .contains(&CacheKey::scope_pattern("api.example.com", "/users")));
        assert_eq!(CacheKey::method_of(k.as_str()), Some("GET"));
        assert_eq!(CacheKey::method_of("other:key"), None);
    }

    #[test]
    fn test_in_scope() {
        let root = key("GET", "/users", &[]);
        let v1 = CacheKey::build("GET", "api.example.com/v1", "/users", &[], &[], &[]);

        assert!(CacheKey::in_scope(root.as_str(), "API.example.com"));
        assert!(!CacheKey::in_scope(root.as_str(), "api.example.com/v1"));
        assert!(CacheKey::in_scope(v1.as_str(), "api.example.com/v1"));
        assert!(CacheKey::in_scope(v1.as_str(), "api.example.com"));
        assert!(!CacheKey::in_scope(v1.as_str(), "api.example.com/v"));
        assert!(!CacheKey::in_scope(v1.as_str(), "api.example.co"));
        assert!(!CacheKey::in_scope("other:key", "api.example.com"));
    }
}
