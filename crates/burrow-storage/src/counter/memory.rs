use super::CounterBackend;
use async_trait::async_trait;
use burrow_core::{Result, StoreError};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// In-process [`CounterBackend`] with Redis-like semantics.
///
/// Counters live in the string map as decimal text, as they do in Redis, so
/// `get` on a counter key returns its current value.
#[derive(Debug, Default)]
pub struct InMemoryCounterBackend {
    strings: DashMap<String, String>,
    hashes: DashMap<String, HashMap<String, String>>,
    closed: AtomicBool,
}

impl InMemoryCounterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CounterBackend for InMemoryCounterBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        trace!(key, "GET");
        Ok(self.strings.get(key).map(|value| value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        trace!(key, "SET");
        self.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        self.ensure_open()?;
        trace!(key, delta, "INCRBY");

        // The entry guard holds the shard lock, which makes read-modify-write atomic.
        let mut entry = self
            .strings
            .entry(key.to_string())
            .or_insert_with(|| "0".to_string());
        let current: i64 = entry.parse().map_err(|_| {
            StoreError::InvalidData(format!("value at '{}' is not an integer", key))
        })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            StoreError::InvalidData(format!("increment of '{}' would overflow", key))
        })?;
        *entry = next.to_string();
        Ok(next)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        self.ensure_open()?;
        trace!(key, fields = fields.len(), "HSET");

        let mut hash = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.ensure_open()?;
        trace!(key, "HGETALL");
        Ok(self
            .hashes
            .get(key)
            .map(|hash| hash.clone())
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed);
        }
        self.strings.clear();
        self.hashes.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn incr_starts_from_zero() {
        let backend = InMemoryCounterBackend::new();
        assert_eq!(backend.incr("count", 1).await.unwrap(), 1);
        assert_eq!(backend.incr("count", 1).await.unwrap(), 2);
        assert_eq!(backend.incr("count", 0).await.unwrap(), 2);
        assert_eq!(backend.get("count").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn incr_rejects_non_integers() {
        let backend = InMemoryCounterBackend::new();
        backend.set("text", "hello").await.unwrap();
        assert!(matches!(
            backend.incr("text", 1).await,
            Err(StoreError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_incr_is_atomic() {
        let backend = Arc::new(InMemoryCounterBackend::new());

        let mut handles = Vec::new();
        for _ in 0..64 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                backend.incr("count", 1).await.unwrap()
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort_unstable();
        assert_eq!(values, (1..=64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn hset_merges_fields() {
        let backend = InMemoryCounterBackend::new();
        backend
            .hset("h", &[("a", "1".to_string()), ("b", "2".to_string())])
            .await
            .unwrap();
        backend.hset("h", &[("b", "3".to_string())]).await.unwrap();

        let hash = backend.hgetall("h").await.unwrap();
        assert_eq!(hash.len(), 2);
        assert_eq!(hash["a"], "1");
        assert_eq!(hash["b"], "3");
        assert!(backend.hgetall("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_is_final() {
        let backend = InMemoryCounterBackend::new();
        backend.set("k", "v").await.unwrap();
        backend.close().await.unwrap();

        assert_eq!(backend.get("k").await.unwrap_err(), StoreError::Closed);
        assert_eq!(backend.close().await.unwrap_err(), StoreError::Closed);
    }
}
