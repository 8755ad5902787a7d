//! SQLite backend
//!
//! One `cache_entries` table keyed by cache key. Schema is versioned the same
//! way as other on-disk stores; migrations run on open.

use super::KvBackend;
use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Default database file name inside the data directory
pub const CACHE_DB_FILE: &str = "fetchgate-cache.db";

#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open (or create) `<data_dir>/fetchgate-cache.db`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;

        let db_path = data_dir.join(CACHE_DB_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // WAL keeps readers unblocked while a background refresh writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        backend.initialize_schema()?;
        info!("Opened cache database at {}", db_path.display());
        Ok(backend)
    }

    /// Platform data directory (`<data_dir>/fetchgate`)
    pub fn open_default() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("Cannot find data directory".to_string()))?
            .join("fetchgate");
        Self::open(dir)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        backend.initialize_schema()?;
        Ok(backend)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    pub fn get_schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to get schema version: {}", e)))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        debug!(
            "Cache database schema ready (version {})",
            CURRENT_SCHEMA_VERSION
        );
        Ok(())
    }
}

#[async_trait]
impl KvBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM cache_entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to read cache entry: {}", e)))
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )
        .map_err(|e| Error::Storage(format!("Failed to write cache entry: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
            .map_err(|e| Error::Storage(format!("Failed to delete cache entry: {}", e)))?;
        Ok(removed > 0)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT key FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Storage(format!("Failed to query keys: {}", e)))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| Error::Storage(format!("Failed to read keys: {}", e)))?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let backend = SqliteBackend::in_memory().expect("Failed to create backend");
        assert_eq!(backend.get_schema_version().unwrap(), 1);

        backend.put("k:1", "v1".to_string()).await.unwrap();
        backend.put("k:1", "v2".to_string()).await.unwrap();
        assert_eq!(backend.get("k:1").await.unwrap().as_deref(), Some("v2"));

        assert!(backend.delete("k:1").await.unwrap());
        assert!(backend.get("k:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prefix_listing() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.put("a%_:1", "x".to_string()).await.unwrap();
        backend.put("a%_:2", "x".to_string()).await.unwrap();
        backend.put("ab:3", "x".to_string()).await.unwrap();

        // LIKE wildcards in the prefix are matched literally
        assert_eq!(backend.keys("a%_:").await.unwrap(), vec!["a%_:1", "a%_:2"]);
        assert_eq!(backend.keys("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_file_backed_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = SqliteBackend::open(dir.path()).unwrap();
            backend.put("persist", "yes".to_string()).await.unwrap();
        }
        let reopened = SqliteBackend::open(dir.path()).unwrap();
        assert_eq!(reopened.get("persist").await.unwrap().as_deref(), Some("yes"));
    }
}
