//! Pipeline observers
//!
//! Observers are notified synchronously from the calling task; keep the
//! callbacks cheap.

use crate::error::GatewayError;
use crate::request::{ApiRequest, RequestContext};
use crate::response::GatewayResponse;

/// Hooks around each call; every method defaults to a no-op
pub trait GatewayObserver: Send + Sync {
    /// Before any cache or network work
    fn on_request(&self, _request: &ApiRequest, _ctx: &RequestContext) {}

    /// Successful network response (including background refreshes)
    fn on_response(&self, _response: &GatewayResponse, _ctx: &RequestContext) {}

    /// Served from cache, either a hit or a fallback
    fn on_cached_response(&self, _response: &GatewayResponse, _ctx: &RequestContext) {}

    fn on_error(&self, _error: &GatewayError, _ctx: &RequestContext) {}
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GatewayObserver for TracingObserver {
    fn on_request(&self, request: &ApiRequest, ctx: &RequestContext) {
        tracing::debug!(
            request_id = %ctx.request_id,
            strategy = %ctx.strategy,
            background = ctx.background_refresh,
            "{} {}",
            request.method,
            request.path
        );
    }

    fn on_response(&self, response: &GatewayResponse, ctx: &RequestContext) {
        tracing::debug!(
            request_id = %ctx.request_id,
            retries = ctx.retry_count,
            "{} {} -> {}",
            response.domain,
            response.path,
            response.status
        );
    }

    fn on_cached_response(&self, response: &GatewayResponse, ctx: &RequestContext) {
        tracing::debug!(
            request_id = %ctx.request_id,
            source = %response.source,
            "{} {} served from cache",
            response.domain,
            response.path
        );
    }

    fn on_error(&self, error: &GatewayError, ctx: &RequestContext) {
        tracing::warn!(request_id = %ctx.request_id, kind = %error.kind, "{}", error);
    }
}
