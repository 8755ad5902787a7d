//! Config - 통합 설정 관리
//!
//! - `domain.rs` - per-domain transport settings
//! - `cache.rs` - response cache settings
//! - `route.rs` - path → domain bindings
//! - `gateway.rs` - GatewayConfig (load / validate)

mod cache;
mod domain;
mod gateway;
mod route;

pub use cache::CacheSettings;
pub use domain::DomainConfig;
pub use gateway::{GatewayConfig, GATEWAY_CONFIG_FILE};
pub use route::RouteConfig;
