//! Freshness-gated cache.
//!
//! [`FreshnessCache`] layers two questions over a [`KvStore`]:
//!
//! - [`get_fresh`](FreshnessCache::get_fresh): is there a value young enough
//!   to serve without asking the upstream?
//! - [`get_stale`](FreshnessCache::get_stale): is there any value at all to
//!   fall back on while the upstream is failing?
//!
//! # Two tiers of expiry
//!
//! Each record carries the instant its payload was computed. Freshness is
//! judged from that timestamp against a per-feed window. Separately, the
//! store drops the record after an outer TTL, which is longer than the
//! window: between the two, a record is stale but still available as a
//! fallback.
//!
//! ```text
//! computed        freshness          outer TTL
//!    |---- fresh ------|---- stale ------|  (gone)
//! ```
//!
//! # Failure semantics
//!
//! Store errors never reach the caller. A failed or undecodable read is a
//! miss; a failed write is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::store::KvStore;
use crate::{FeedError, Result, telemetry};

/// A stored payload plus the instant it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Milliseconds since the unix epoch at which `payload` was computed.
    pub timestamp: i64,
    pub payload: T,
}

impl<T> CacheEntry<T> {
    /// Age of the payload at `now_ms`. Entries from the future are age zero.
    pub fn age(&self, now_ms: i64) -> Duration {
        let millis = now_ms.saturating_sub(self.timestamp).max(0);
        Duration::from_millis(millis as u64)
    }

    /// Whether the payload is younger than `max_age` at `now_ms`.
    ///
    /// The boundary is exclusive: an age equal to `max_age` is stale.
    pub fn is_fresh(&self, now_ms: i64, max_age: Duration) -> bool {
        self.age(now_ms) < max_age
    }
}

/// Per-feed cache timing.
///
/// ```rust
/// # use snapfeed::CachePolicy;
/// # use std::time::Duration;
/// let policy = CachePolicy::new(Duration::from_secs(60), Duration::from_secs(120)).unwrap();
/// assert!(CachePolicy::new(Duration::from_secs(120), Duration::from_secs(60)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum age served without re-fetching upstream.
    pub freshness: Duration,
    /// Store-level expiry; bounds how long a stale fallback stays available.
    pub outer_ttl: Duration,
}

impl CachePolicy {
    /// Create a policy. The freshness window must not exceed the outer TTL.
    pub fn new(freshness: Duration, outer_ttl: Duration) -> Result<Self> {
        if freshness > outer_ttl {
            return Err(FeedError::Configuration(format!(
                "freshness window {freshness:?} exceeds outer TTL {outer_ttl:?}"
            )));
        }
        Ok(Self {
            freshness,
            outer_ttl,
        })
    }
}

/// Freshness and fallback lookups over an injected [`KvStore`].
#[derive(Clone)]
pub struct FreshnessCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl FreshnessCache {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The payload under `key` if it is younger than `max_age`.
    ///
    /// A present but stale entry is a miss.
    pub async fn get_fresh<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let entry = self.load::<T>(key).await;
        let now_ms = self.clock.now().timestamp_millis();
        match entry {
            Some(entry) if entry.is_fresh(now_ms, max_age) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "key" => key.to_string())
                    .increment(1);
                Some(entry.payload)
            }
            Some(entry) => {
                debug!(key, age_ms = entry.age(now_ms).as_millis() as u64, "cached entry is stale");
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "key" => key.to_string())
                    .increment(1);
                None
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "key" => key.to_string())
                    .increment(1);
                None
            }
        }
    }

    /// Whatever payload is stored under `key`, regardless of age.
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.load::<T>(key).await.map(|entry| entry.payload)
    }

    /// Store `payload` stamped with the current time, expiring after `outer_ttl`.
    ///
    /// Best effort: failures are logged, never returned.
    pub async fn put<T: Serialize>(&self, key: &str, payload: &T, outer_ttl: Duration) {
        let entry = CacheEntry {
            timestamp: self.clock.now().timestamp_millis(),
            payload,
        };
        let value = match serde_json::to_value(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.put(key, value, outer_ttl).await {
            warn!(key, error = %e, "cache write failed");
            metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "put").increment(1);
        }
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let value = match self.store.get(key).await {
            Ok(v) => v?,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "get")
                    .increment(1);
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "undecodable cache entry, treating as miss");
                None
            }
        }
    }
}
