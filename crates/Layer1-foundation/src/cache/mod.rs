//! # Response cache
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  CacheStore                                  │
//! │  ├── CacheKey     (deterministic keys)       │
//! │  ├── CacheEntry   (ttl + expiresAt)          │
//! │  └── Clock        (system / manual)          │
//! ├──────────────────────────────────────────────┤
//! │  KvBackend                                   │
//! │  ├── MemoryBackend                           │
//! │  └── SqliteBackend                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Reads never fail on bad data: expired or corrupted entries are deleted and
//! reported as a miss.

pub mod backend;
mod clock;
mod entry;
mod key;
mod stats;
mod store;

pub use backend::{KvBackend, MemoryBackend, SqliteBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CachePriority};
pub use key::{normalize_path, CacheKey, CACHE_KEY_PREFIX};
pub use stats::CacheStats;
pub use store::{CacheStore, MatchMode};
