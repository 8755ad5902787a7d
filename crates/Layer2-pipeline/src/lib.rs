//! # fetchgate-pipeline
//!
//! Strategy-driven HTTP request pipeline for fetchgate.
//!
//! ## Features
//! - Six caching strategies resolved per call
//! - Background revalidation with a cancellable task scope
//! - Bearer auth with one refresh-and-retry
//! - Automatic retry with exponential backoff
//! - Cache fallback on network failures and configured status codes

pub mod auth;
pub mod error;
pub mod gateway;
pub mod observer;
pub mod request;
pub mod response;
pub mod retry;
pub mod route;
pub mod strategy;
pub mod transport;

// Pipeline
pub use gateway::{CacheFilter, Gateway, GatewayBuilder};
pub use request::{ApiRequest, HttpMethod, RequestContext};
pub use response::{GatewayResponse, ResponseSource};
pub use strategy::CacheStrategy;

// Stages
pub use auth::{AuthHandler, AuthStage, RefreshOutcome, StaticToken};
pub use observer::{GatewayObserver, TracingObserver};
pub use route::{ResolvedRoute, Route, RouteMatcher, RoutePattern};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

// Error and retry
pub use error::{ErrorKind, GatewayError, TransportError};
pub use retry::RetryConfig;
