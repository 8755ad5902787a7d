//! In-memory backend

use super::KvBackend;
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let backend = MemoryBackend::new();
        assert!(backend.get("a").await.unwrap().is_none());

        backend.put("a:1", "one".to_string()).await.unwrap();
        backend.put("a:2", "two".to_string()).await.unwrap();
        backend.put("b:1", "three".to_string()).await.unwrap();

        assert_eq!(backend.get("a:1").await.unwrap().as_deref(), Some("one"));
        assert_eq!(backend.keys("a:").await.unwrap(), vec!["a:1", "a:2"]);
        assert_eq!(backend.keys("").await.unwrap().len(), 3);

        assert!(backend.delete("a:1").await.unwrap());
        assert!(!backend.delete("a:1").await.unwrap());
        assert_eq!(backend.len(), 2);
    }
}
