//! Key-value backends for the cache store
//!
//! - `memory`: process-local map, used by default and in tests
//! - `sqlite`: durable single-table store

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::Result;
use async_trait::async_trait;

/// Durable key-value storage consumed by [`CacheStore`](super::CacheStore)
///
/// Implementations must tolerate concurrent calls from in-flight requests and
/// detached background refreshes.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: String) -> Result<()>;

    /// Returns whether a value was removed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Keys starting with `prefix` (empty prefix lists everything)
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}
