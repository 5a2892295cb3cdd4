//! Key-value storage with per-record expiry.
//!
//! The freshness cache talks to storage only through [`KvStore`], so the
//! backend is injected rather than global. [`MemoryStore`] is the in-process
//! implementation used by the daemon and the tests.
//!
//! # Future extensibility: shared storage
//!
//! Several daemon instances behind a load balancer each keep their own
//! [`MemoryStore`]. A shared backend (redis, a hosted KV namespace) only has
//! to implement [`KvStore`]; records are plain JSON and expiry is a TTL
//! handed over on every write, which is what such stores expose natively.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;

use crate::Result;

/// A JSON key-value store whose records expire on their own.
///
/// Implementations report backend failures as
/// [`FeedError::CacheUnavailable`](crate::FeedError::CacheUnavailable).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the record under `key`. `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write (or overwrite) `key`, expiring it `ttl` after this write.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;
}

/// Configuration for [`MemoryStore`].
///
/// ```rust
/// # use snapfeed::StoreConfig;
/// let config = StoreConfig::new().max_entries(64);
/// assert_eq!(config.max_entries, 64);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of records. Default: 1,000.
    pub max_entries: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_entries: 1_000 }
    }
}

impl StoreConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of records.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }
}

#[derive(Clone, Debug)]
struct StoredRecord {
    value: Value,
    ttl: Duration,
}

/// Expires each record after the TTL it was written with.
struct RecordExpiry;

impl Expiry<String, StoredRecord> for RecordExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredRecord,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process [`KvStore`] backed by a bounded moka cache.
///
/// Thread-safe; moka handles concurrent access internally. Clones share the
/// same underlying records.
#[derive(Clone)]
pub struct MemoryStore {
    records: Cache<String, StoredRecord>,
}

impl MemoryStore {
    /// Create a store with the default capacity.
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    /// Create a store from the given configuration.
    pub fn with_config(config: &StoreConfig) -> Self {
        let records = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(RecordExpiry)
            .build();
        Self { records }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.get(key).await.map(|record| record.value))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.records
            .insert(key.to_string(), StoredRecord { value, ttl })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryStore::new();
        store
            .put("k", json!({"a": 1}), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let store = MemoryStore::new();
        store.put("k", json!(1), Duration::from_secs(60)).await.unwrap();
        store.put("k", json!(2), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn record_expires_after_its_ttl() {
        let store = MemoryStore::new();
        store
            .put("short", json!("x"), Duration::from_millis(20))
            .await
            .unwrap();
        store
            .put("long", json!("y"), Duration::from_secs(60))
            .await
            .unwrap();

        std::thread::sleep(Duration::from_millis(80));

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some(json!("y")));
    }

    #[tokio::test]
    async fn clones_share_records() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.put("k", json!(true), Duration::from_secs(60)).await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some(json!(true)));
    }

    #[test]
    fn config_builder_pattern() {
        let config = StoreConfig::new().max_entries(10);
        assert_eq!(config.max_entries, 10);
        assert_eq!(StoreConfig::default().max_entries, 1_000);
    }
}
