//! # fetchgate-foundation
//!
//! Foundation layer for fetchgate:
//! - Error: 공통 에러 타입 (`Error`, `Result`)
//! - Config: domains, routes and cache settings (`GatewayConfig`)
//! - Cache: typed cache store over pluggable key-value backends
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Layer2-pipeline (Gateway)                              │
//! │        │                         │                      │
//! │        ▼                         ▼                      │
//! │  GatewayConfig             CacheStore                   │
//! │  (domains, routes,         ├── CacheKey / CacheEntry    │
//! │   cache settings)          └── KvBackend                │
//! │                                ├── MemoryBackend        │
//! │                                └── SqliteBackend        │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{CacheSettings, DomainConfig, GatewayConfig, RouteConfig, GATEWAY_CONFIG_FILE};

// ============================================================================
// Cache (캐시)
// ============================================================================
pub use cache::{
    normalize_path, CacheEntry, CacheKey, CachePriority, CacheStats, CacheStore, Clock,
    KvBackend, ManualClock, MatchMode, MemoryBackend, SqliteBackend, SystemClock,
    CACHE_KEY_PREFIX,
};
