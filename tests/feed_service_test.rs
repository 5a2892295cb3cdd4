//! Tests for the fetch / store / fallback procedure in [`FeedService`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use snapfeed::{
    CachePolicy, Clock, FeedContext, FeedEnvelope, FeedError, FeedItem, FeedService, FeedSource,
    FreshnessCache, KvStore, ManualClock, MemoryStore, Origin, Result,
};

// ============================================================================
// Mock sources
// ============================================================================

fn envelope(title: &str, feed_url: &str) -> FeedEnvelope {
    FeedEnvelope::snapshot(
        "Mock feed",
        "https://example.test",
        feed_url,
        "mock",
        FeedItem {
            id: title.to_string(),
            url: "https://example.test/item".to_string(),
            title: title.to_string(),
            content_html: format!("<p>{title}</p>"),
            content_text: None,
            summary: None,
            date_published: "2026-10-17T09:30:00.000Z".to_string(),
            author: None,
            external_url: None,
        },
    )
}

/// Source whose upstream can be switched between healthy and failing.
struct MockSource {
    calls: AtomicU32,
    failing: AtomicBool,
    with_degraded: bool,
}

impl MockSource {
    fn healthy() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failing: false.into(),
            with_degraded: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failing: true.into(),
            with_degraded: false,
        }
    }

    fn with_degraded(mut self) -> Self {
        self.with_degraded = true;
        self
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn cache_key(&self) -> &str {
        "mock_feed"
    }

    fn policy(&self) -> CachePolicy {
        CachePolicy {
            freshness: Duration::from_secs(60),
            outer_ttl: Duration::from_secs(120),
        }
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn failure_message(&self) -> &str {
        "Failed to fetch mock"
    }

    async fn fetch(&self, ctx: &FeedContext) -> Result<FeedEnvelope> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::UpstreamUnreachable("connection reset".into()));
        }
        Ok(envelope(&format!("fetch #{n}"), &ctx.feed_url))
    }

    fn degraded(&self, ctx: &FeedContext, _error: &FeedError) -> Option<FeedEnvelope> {
        self.with_degraded
            .then(|| envelope("placeholder", &ctx.feed_url))
    }
}

/// Store whose backend is down: every read and write fails.
#[derive(Default)]
struct BrokenStore {
    reads: AtomicU32,
    writes: AtomicU32,
}

#[async_trait]
impl KvStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(FeedError::CacheUnavailable("connection refused".into()))
    }

    async fn put(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(FeedError::CacheUnavailable("connection refused".into()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    service: FeedService,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap(),
        ));
        let cache = FreshnessCache::new(Arc::new(MemoryStore::new()), clock.clone());
        Self {
            service: FeedService::new(cache),
            clock,
        }
    }

    fn ctx(&self) -> FeedContext {
        FeedContext::new("https://feeds.test/mock.json", self.clock.now())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn miss_fetches_and_stores() {
    let h = Harness::new();
    let source = MockSource::healthy();

    let served = h.service.serve(&source, &h.ctx()).await.unwrap();
    assert_eq!(served.origin, Origin::Upstream);
    assert_eq!(served.envelope.items[0].title, "fetch #1");
    assert_eq!(source.calls(), 1);

    let stored: Option<FeedEnvelope> = h.service.cache().get_stale("mock_feed").await;
    assert_eq!(stored, Some(served.envelope));
}

#[tokio::test]
async fn fresh_hit_skips_upstream() {
    let h = Harness::new();
    let source = MockSource::healthy();

    let first = h.service.serve(&source, &h.ctx()).await.unwrap();
    h.clock.advance(Duration::from_secs(30));
    let second = h.service.serve(&source, &h.ctx()).await.unwrap();

    assert_eq!(source.calls(), 1, "fresh hit must not call upstream");
    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(second.envelope, first.envelope);
}

#[tokio::test]
async fn expired_freshness_refetches() {
    let h = Harness::new();
    let source = MockSource::healthy();

    h.service.serve(&source, &h.ctx()).await.unwrap();
    h.clock.advance(Duration::from_secs(60));
    let served = h.service.serve(&source, &h.ctx()).await.unwrap();

    assert_eq!(source.calls(), 2);
    assert_eq!(served.origin, Origin::Upstream);
    assert_eq!(served.envelope.items[0].title, "fetch #2");
}

#[tokio::test]
async fn upstream_failure_serves_stale_snapshot() {
    let h = Harness::new();
    let source = MockSource::healthy().with_degraded();

    let first = h.service.serve(&source, &h.ctx()).await.unwrap();
    h.clock.advance(Duration::from_secs(90));
    source.set_failing(true);

    let served = h.service.serve(&source, &h.ctx()).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(served.origin, Origin::Stale);
    assert_eq!(served.envelope, first.envelope, "stale snapshot is byte-identical");
}

#[tokio::test]
async fn stale_is_preferred_over_degraded() {
    let h = Harness::new();
    let source = MockSource::healthy().with_degraded();

    h.service.serve(&source, &h.ctx()).await.unwrap();
    h.clock.advance(Duration::from_secs(61));
    source.set_failing(true);

    let served = h.service.serve(&source, &h.ctx()).await.unwrap();
    assert_ne!(served.envelope.items[0].title, "placeholder");
}

#[tokio::test]
async fn failure_with_nothing_stored_uses_degraded() {
    let h = Harness::new();
    let source = MockSource::failing().with_degraded();

    let served = h.service.serve(&source, &h.ctx()).await.unwrap();
    assert_eq!(served.origin, Origin::Degraded);
    assert_eq!(served.envelope.items[0].title, "placeholder");
}

#[tokio::test]
async fn degraded_envelope_is_not_cached() {
    let h = Harness::new();
    let source = MockSource::failing().with_degraded();

    h.service.serve(&source, &h.ctx()).await.unwrap();
    let stored: Option<FeedEnvelope> = h.service.cache().get_stale("mock_feed").await;
    assert!(stored.is_none());

    // Next request still goes upstream and succeeds once it recovers.
    source.set_failing(false);
    let served = h.service.serve(&source, &h.ctx()).await.unwrap();
    assert_eq!(served.origin, Origin::Upstream);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn failure_with_no_fallback_is_error() {
    let h = Harness::new();
    let source = MockSource::failing();

    let err = h.service.serve(&source, &h.ctx()).await.unwrap_err();
    assert!(matches!(err, FeedError::UpstreamUnreachable(_)));
}

#[tokio::test]
async fn failures_never_overwrite_snapshot() {
    let h = Harness::new();
    let source = MockSource::healthy();

    let first = h.service.serve(&source, &h.ctx()).await.unwrap();
    source.set_failing(true);
    for _ in 0..3 {
        h.clock.advance(Duration::from_secs(61));
        let served = h.service.serve(&source, &h.ctx()).await;
        // Outer TTL is wall-clock; manual time only moves freshness.
        assert_eq!(served.unwrap().envelope, first.envelope);
    }
}

// ============================================================================
// Store outages
// ============================================================================

#[tokio::test]
async fn broken_store_still_serves_upstream() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap(),
    ));
    let store = Arc::new(BrokenStore::default());
    let service = FeedService::new(FreshnessCache::new(store.clone(), clock.clone()));
    let source = MockSource::healthy();
    let ctx = FeedContext::new("https://feeds.test/mock.json", clock.now());

    let first = service.serve(&source, &ctx).await.unwrap();
    assert_eq!(first.origin, Origin::Upstream);
    assert_eq!(first.envelope.items[0].title, "fetch #1");
    assert_eq!(source.calls(), 1);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);

    // The write was lost, so the very next request goes upstream again.
    let second = service.serve(&source, &ctx).await.unwrap();
    assert_eq!(second.origin, Origin::Upstream);
    assert_eq!(second.envelope.items[0].title, "fetch #2");
    assert_eq!(source.calls(), 2);
    assert!(store.reads.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn broken_store_with_failing_upstream_degrades() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap(),
    ));
    let service = FeedService::new(FreshnessCache::new(
        Arc::new(BrokenStore::default()),
        clock.clone(),
    ));
    let ctx = FeedContext::new("https://feeds.test/mock.json", clock.now());

    let degraded = MockSource::failing().with_degraded();
    let served = service.serve(&degraded, &ctx).await.unwrap();
    assert_eq!(served.origin, Origin::Degraded);

    let bare = MockSource::failing();
    let err = service.serve(&bare, &ctx).await.unwrap_err();
    assert!(matches!(err, FeedError::UpstreamUnreachable(_)));
}
