//! Telemetry metric name constants.
//!
//! Centralised metric names for snapfeed operations. The daemon does not
//! install a `metrics` recorder; embedders that want numbers install their
//! own (prometheus, statsd). Without one, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `snapfeed_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `key` - cache key (e.g. "btc_feed")
//! - `feed` - feed source name (e.g. "btc-usd", "aemet-isobaras")
//! - `status` - outcome: "ok" or "error"
//! - `operation` - store operation: "get" or "put"

/// Cache lookups that found a fresh entry.
///
/// Labels: `key`.
pub const CACHE_HITS_TOTAL: &str = "snapfeed_cache_hits_total";

/// Cache lookups that found nothing, or only a stale entry.
///
/// Labels: `key`.
pub const CACHE_MISSES_TOTAL: &str = "snapfeed_cache_misses_total";

/// Store failures swallowed by the cache.
///
/// Labels: `operation` ("get" | "put").
pub const CACHE_ERRORS_TOTAL: &str = "snapfeed_cache_errors_total";

/// Upstream fetches attempted.
///
/// Labels: `feed`, `status` ("ok" | "error").
pub const UPSTREAM_REQUESTS_TOTAL: &str = "snapfeed_upstream_requests_total";

/// Upstream fetch duration in seconds (all calls of one fetch together).
///
/// Labels: `feed`.
pub const UPSTREAM_DURATION_SECONDS: &str = "snapfeed_upstream_duration_seconds";

/// Responses answered with a stale snapshot after an upstream failure.
///
/// Labels: `feed`.
pub const STALE_FALLBACKS_TOTAL: &str = "snapfeed_stale_fallbacks_total";

/// Responses answered with a degraded rendering (nothing cached, upstream down).
///
/// Labels: `feed`.
pub const DEGRADED_RENDERS_TOTAL: &str = "snapfeed_degraded_renders_total";
