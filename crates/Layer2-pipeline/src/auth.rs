//! Auth stage
//!
//! Attaches a bearer token to calls whose route requires auth and recovers
//! from a rejected token by refreshing it once.

use crate::error::GatewayError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Outcome of [`AuthHandler::refresh`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefreshOutcome {
    /// The handler cannot refresh tokens
    #[default]
    Unsupported,
    /// A new token is available through [`AuthHandler::token`]
    Refreshed,
    Failed(String),
}

/// Source of credentials for authenticated routes
#[async_trait]
pub trait AuthHandler: Send + Sync {
    /// Current access token, if any
    async fn token(&self) -> Option<String>;

    /// Whether a 401/403 should trigger a refresh-and-retry
    fn should_retry(&self, _error: &GatewayError) -> bool {
        true
    }

    async fn refresh(&self) -> RefreshOutcome {
        RefreshOutcome::Unsupported
    }

    /// Called once the token is known to be unusable
    async fn on_invalid_token(&self) {}

    /// Last chance to rewrite an unrecovered auth failure
    async fn on_auth_error(&self, error: GatewayError) -> GatewayError {
        error
    }
}

/// Fixed token with no refresh support
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the token from an environment variable; `None` when unset or empty
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl AuthHandler for StaticToken {
    async fn token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Wraps a send operation with token injection and one refresh-and-retry
#[derive(Clone, Default)]
pub struct AuthStage {
    handler: Option<Arc<dyn AuthHandler>>,
}

impl AuthStage {
    pub fn new(handler: Option<Arc<dyn AuthHandler>>) -> Self {
        Self { handler }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Run `send` with the token to attach (`None` when auth is not required)
    ///
    /// At most one refresh happens per call. A second auth failure is not
    /// retried again.
    pub async fn execute<T, F, Fut>(
        &self,
        requires_auth: bool,
        domain: &str,
        path: &str,
        send: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        if !requires_auth {
            return send(None).await;
        }

        let handler = match &self.handler {
            Some(handler) => handler,
            None => return Err(GatewayError::authentication_required(domain, path)),
        };
        let token = match handler.token().await {
            Some(token) => token,
            None => return Err(GatewayError::authentication_required(domain, path)),
        };

        let error = match send(Some(token)).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_auth_failure() => e,
            Err(e) => return Err(e),
        };

        if !handler.should_retry(&error) {
            debug!("auth: retry declined for {} {}", domain, path);
            return Err(self.give_up(handler, error).await);
        }

        match handler.refresh().await {
            RefreshOutcome::Refreshed => {}
            RefreshOutcome::Unsupported => {
                debug!("auth: token refresh unsupported");
                return Err(self.give_up(handler, error).await);
            }
            RefreshOutcome::Failed(reason) => {
                warn!("auth: token refresh failed: {}", reason);
                return Err(self.give_up(handler, error).await);
            }
        }

        let token = match handler.token().await {
            Some(token) => token,
            None => return Err(self.give_up(handler, error).await),
        };

        debug!("auth: retrying {} {} with refreshed token", domain, path);
        // One retry only; whatever it fails with ends the call
        match send(Some(token)).await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.give_up(handler, e).await),
        }
    }

    async fn give_up(&self, handler: &Arc<dyn AuthHandler>, error: GatewayError) -> GatewayError {
        handler.on_invalid_token().await;
        handler.on_auth_error(error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RotatingToken {
        current: Mutex<String>,
        refresh_result: RefreshOutcome,
        retry: bool,
        refreshes: AtomicUsize,
        invalidations: AtomicUsize,
    }

    impl RotatingToken {
        fn new(refresh_result: RefreshOutcome) -> Self {
            Self {
                current: Mutex::new("old".to_string()),
                refresh_result,
                retry: true,
                refreshes: AtomicUsize::new(0),
                invalidations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthHandler for RotatingToken {
        async fn token(&self) -> Option<String> {
            Some(self.current.lock().clone())
        }

        fn should_retry(&self, _error: &GatewayError) -> bool {
            self.retry
        }

        async fn refresh(&self) -> RefreshOutcome {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            *self.current.lock() = "new".to_string();
            self.refresh_result.clone()
        }

        async fn on_invalid_token(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Replays statuses in order and records the tokens it was given
    struct Script {
        statuses: Mutex<VecDeque<u16>>,
        seen: Mutex<Vec<Option<String>>>,
    }

    impl Script {
        fn new(statuses: &[u16]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        async fn send(&self, token: Option<String>) -> Result<u16, GatewayError> {
            self.seen.lock().push(token);
            let status = self.statuses.lock().pop_front().unwrap_or(200);
            if (200..300).contains(&status) {
                Ok(status)
            } else {
                Err(GatewayError::from_status(status, Value::Null, "api", "/me"))
            }
        }
    }

    #[tokio::test]
    async fn test_public_route_sends_without_token() {
        let stage = AuthStage::new(None);
        let script = Script::new(&[200]);

        let result = stage.execute(false, "api", "/me", |t| script.send(t)).await;

        assert_eq!(result.unwrap(), 200);
        assert_eq!(*script.seen.lock(), vec![None]);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let stage = AuthStage::new(None);
        let script = Script::new(&[200]);

        let err = stage
            .execute(true, "api", "/me", |t| script.send(t))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::AuthenticationRequired);
        assert!(script.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_then_retry_once() {
        let handler = Arc::new(RotatingToken::new(RefreshOutcome::Refreshed));
        let stage = AuthStage::new(Some(handler.clone()));
        let script = Script::new(&[401, 200]);

        let result = stage.execute(true, "api", "/me", |t| script.send(t)).await;

        assert_eq!(result.unwrap(), 200);
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(handler.invalidations.load(Ordering::SeqCst), 0);
        assert_eq!(
            *script.seen.lock(),
            vec![Some("old".to_string()), Some("new".to_string())]
        );
    }

    #[tokio::test]
    async fn test_second_rejection_gives_up() {
        let handler = Arc::new(RotatingToken::new(RefreshOutcome::Refreshed));
        let stage = AuthStage::new(Some(handler.clone()));
        let script = Script::new(&[401, 401, 200]);

        let err = stage
            .execute(true, "api", "/me", |t| script.send(t))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(handler.invalidations.load(Ordering::SeqCst), 1);
        assert_eq!(script.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_refresh_invalidates() {
        let handler = Arc::new(RotatingToken::new(RefreshOutcome::Unsupported));
        let stage = AuthStage::new(Some(handler.clone()));
        let script = Script::new(&[403]);

        let err = stage
            .execute(true, "api", "/me", |t| script.send(t))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(handler.invalidations.load(Ordering::SeqCst), 1);
        assert_eq!(script.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_declined_retry_skips_refresh() {
        let mut handler = RotatingToken::new(RefreshOutcome::Refreshed);
        handler.retry = false;
        let handler = Arc::new(handler);
        let stage = AuthStage::new(Some(handler.clone()));
        let script = Script::new(&[401]);

        let err = stage
            .execute(true, "api", "/me", |t| script.send(t))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(handler.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_retry_invalidates_token() {
        let handler = Arc::new(RotatingToken::new(RefreshOutcome::Refreshed));
        let stage = AuthStage::new(Some(handler.clone()));
        let script = Script::new(&[401, 500]);

        let err = stage
            .execute(true, "api", "/me", |t| script.send(t))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InternalServerError);
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(handler.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_error_hook_rewrites() {
        struct Rewriting;

        #[async_trait]
        impl AuthHandler for Rewriting {
            async fn token(&self) -> Option<String> {
                Some("t".to_string())
            }

            async fn on_auth_error(&self, mut error: GatewayError) -> GatewayError {
                error.message = "session expired".to_string();
                error
            }
        }

        let stage = AuthStage::new(Some(Arc::new(Rewriting)));
        let script = Script::new(&[401]);

        let err = stage
            .execute(true, "api", "/me", |t| script.send(t))
            .await
            .unwrap_err();

        assert_eq!(err.message, "session expired");
    }

    #[tokio::test]
    async fn test_static_token() {
        let handler = StaticToken::new("abc");
        assert_eq!(handler.token().await.as_deref(), Some("abc"));
        assert_eq!(handler.refresh().await, RefreshOutcome::Unsupported);
        assert_eq!(bearer("abc"), "Bearer abc");
    }
}
