//! Feed producers and the shared fetch-with-cache-and-fallback procedure.
//!
//! Every feed is a [`FeedSource`]: a cache key, a [`CachePolicy`], and an
//! upstream fetch that yields a finished [`FeedEnvelope`]. [`FeedService`]
//! runs the same steps for all of them:
//!
//! 1. fresh cache hit → serve it, no upstream call
//! 2. otherwise fetch upstream
//! 3. on failure → last stored snapshot, else the source's degraded
//!    rendering, else the error
//! 4. on success → store the snapshot and serve it
//!
//! # Adding a feed
//!
//! Implement [`FeedSource`], add a [`FeedKind`](crate::FeedKind) variant and
//! wire it into the gateway. Override [`FeedSource::degraded`] only when the
//! feed has something meaningful to show with no data at all.

mod envelope;
pub mod isobar;
pub mod price;

pub use envelope::{FeedEnvelope, FeedItem, JSON_FEED_VERSION};
pub use isobar::IsobarMapFeed;
pub use price::PriceFeed;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::{CachePolicy, FreshnessCache};
use crate::{FeedError, Result, telemetry};

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Per-request inputs to a feed fetch.
#[derive(Debug, Clone)]
pub struct FeedContext {
    /// Canonical URL of the feed being requested (the envelope's `feed_url`).
    pub feed_url: String,
    /// Request time; item ids and editorial dates derive from it.
    pub now: DateTime<Utc>,
}

impl FeedContext {
    pub fn new(feed_url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            feed_url: feed_url.into(),
            now,
        }
    }
}

/// A feed built from one upstream resource.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Feed name for logging and metrics.
    fn name(&self) -> &str;

    /// Store key the snapshot lives under.
    fn cache_key(&self) -> &str;

    /// Freshness window and outer TTL.
    fn policy(&self) -> CachePolicy;

    /// `max-age` advertised to HTTP clients for fresh responses.
    fn max_age(&self) -> Duration;

    /// User-facing message when the feed cannot be served at all.
    fn failure_message(&self) -> &str;

    /// Call the upstream and build a fresh envelope.
    async fn fetch(&self, ctx: &FeedContext) -> Result<FeedEnvelope>;

    /// Envelope to serve when the upstream failed and nothing is stored.
    ///
    /// Degraded envelopes are never cached. Default: none, the error
    /// surfaces.
    fn degraded(&self, _ctx: &FeedContext, _error: &FeedError) -> Option<FeedEnvelope> {
        None
    }
}

/// Where a served envelope came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fresh cache hit.
    Cache,
    /// Just fetched from the upstream.
    Upstream,
    /// Stored snapshot past its freshness window, served because the
    /// upstream failed.
    Stale,
    /// Placeholder rendering; upstream failed and nothing was stored.
    Degraded,
}

impl Origin {
    /// Whether the envelope is within its freshness window.
    pub fn is_fresh(self) -> bool {
        matches!(self, Origin::Cache | Origin::Upstream)
    }
}

/// An envelope and its [`Origin`].
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub envelope: FeedEnvelope,
    pub origin: Origin,
}

/// Runs any [`FeedSource`] through the freshness cache.
#[derive(Clone)]
pub struct FeedService {
    cache: FreshnessCache,
}

impl FeedService {
    pub fn new(cache: FreshnessCache) -> Self {
        Self { cache }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &FreshnessCache {
        &self.cache
    }

    /// Serve `source`, preferring fresh cache, then upstream, then fallbacks.
    ///
    /// Returns `Err` only when the upstream failed, nothing is stored under
    /// the source's key, and the source has no degraded rendering.
    pub async fn serve(&self, source: &dyn FeedSource, ctx: &FeedContext) -> Result<Served> {
        let feed = source.name();
        let key = source.cache_key();
        let policy = source.policy();

        if let Some(envelope) = self.cache.get_fresh(key, policy.freshness).await {
            debug!(feed, key, "serving fresh cached feed");
            return Ok(Served {
                envelope,
                origin: Origin::Cache,
            });
        }

        let start = Instant::now();
        let fetched = source.fetch(ctx).await;
        metrics::histogram!(telemetry::UPSTREAM_DURATION_SECONDS, "feed" => feed.to_string())
            .record(start.elapsed().as_secs_f64());

        match fetched {
            Ok(envelope) => {
                metrics::counter!(
                    telemetry::UPSTREAM_REQUESTS_TOTAL,
                    "feed" => feed.to_string(),
                    "status" => "ok"
                )
                .increment(1);
                self.cache.put(key, &envelope, policy.outer_ttl).await;
                debug!(feed, key, "stored fresh feed");
                Ok(Served {
                    envelope,
                    origin: Origin::Upstream,
                })
            }
            Err(error) => {
                metrics::counter!(
                    telemetry::UPSTREAM_REQUESTS_TOTAL,
                    "feed" => feed.to_string(),
                    "status" => "error"
                )
                .increment(1);
                warn!(feed, error = %error, "upstream fetch failed");

                if let Some(envelope) = self.cache.get_stale(key).await {
                    info!(feed, key, "serving stale feed after upstream failure");
                    metrics::counter!(telemetry::STALE_FALLBACKS_TOTAL, "feed" => feed.to_string())
                        .increment(1);
                    return Ok(Served {
                        envelope,
                        origin: Origin::Stale,
                    });
                }

                if let Some(envelope) = source.degraded(ctx, &error) {
                    info!(feed, "serving degraded feed, nothing cached");
                    metrics::counter!(telemetry::DEGRADED_RENDERS_TOTAL, "feed" => feed.to_string())
                        .increment(1);
                    return Ok(Served {
                        envelope,
                        origin: Origin::Degraded,
                    });
                }

                Err(error)
            }
        }
    }
}

/// Send `request`, mapping transport failures and non-2xx statuses.
pub(crate) async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| FeedError::UpstreamUnreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FeedError::UpstreamError {
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        });
    }
    Ok(response)
}

/// Read an upstream JSON body into `T`, reporting shape mismatches as malformed.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| FeedError::UpstreamMalformed(e.to_string()))
}
