//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use super::FeedGateway;
use crate::cache::{CachePolicy, FreshnessCache};
use crate::clock::{Clock, SystemClock};
use crate::feeds::{FeedService, IsobarMapFeed, PriceFeed, isobar, price};
use crate::store::{KvStore, MemoryStore};
use crate::{FeedError, Result, version};

/// Default timeout for each upstream call.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Main entry point for creating gateway instances.
pub struct Snapfeed;

impl Snapfeed {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> SnapfeedBuilder {
        SnapfeedBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// Every setting is optional. Feeds without an API key still build; their
/// fetches fail and are answered from cache, a degraded rendering, or an
/// error response.
pub struct SnapfeedBuilder {
    coingecko_key: Option<String>,
    aemet_key: Option<String>,
    coingecko_base_url: String,
    aemet_base_url: String,
    timeout_secs: Option<u64>,
    store: Option<Arc<dyn KvStore>>,
    clock: Option<Arc<dyn Clock>>,
    price_policy: Option<CachePolicy>,
    isobar_map_policy: Option<CachePolicy>,
}

impl SnapfeedBuilder {
    pub fn new() -> Self {
        Self {
            coingecko_key: None,
            aemet_key: None,
            coingecko_base_url: price::DEFAULT_BASE_URL.to_string(),
            aemet_base_url: isobar::DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            store: None,
            clock: None,
            price_policy: None,
            isobar_map_policy: None,
        }
    }

    /// Configure the CoinGecko API key (price feed).
    pub fn coingecko_key(mut self, api_key: impl Into<String>) -> Self {
        self.coingecko_key = Some(api_key.into());
        self
    }

    /// Configure the AEMET OpenData API key (isobar map feed).
    pub fn aemet_key(mut self, api_key: impl Into<String>) -> Self {
        self.aemet_key = Some(api_key.into());
        self
    }

    /// Override the CoinGecko base URL (for testing with wiremock).
    pub fn coingecko_base_url(mut self, url: impl Into<String>) -> Self {
        self.coingecko_base_url = url.into();
        self
    }

    /// Override the AEMET base URL (for testing with wiremock).
    pub fn aemet_base_url(mut self, url: impl Into<String>) -> Self {
        self.aemet_base_url = url.into();
        self
    }

    /// Set the timeout applied to every upstream call (seconds).
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Use `store` for snapshots instead of a fresh [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `clock` instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Override the price feed's cache policy (default 60s fresh, 120s TTL).
    pub fn price_policy(mut self, policy: CachePolicy) -> Self {
        self.price_policy = Some(policy);
        self
    }

    /// Override the isobar map feed's cache policy (default 3h fresh, 6h TTL).
    pub fn isobar_map_policy(mut self, policy: CachePolicy) -> Self {
        self.isobar_map_policy = Some(policy);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<FeedGateway> {
        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(version::user_agent())
            .build()
            .map_err(|e| FeedError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let mut price = PriceFeed::new(http.clone(), self.coingecko_base_url, self.coingecko_key);
        if let Some(policy) = self.price_policy {
            price = price.with_policy(policy);
        }

        let mut isobar_map = IsobarMapFeed::new(http, self.aemet_base_url, self.aemet_key);
        if let Some(policy) = self.isobar_map_policy {
            isobar_map = isobar_map.with_policy(policy);
        }

        let service = FeedService::new(FreshnessCache::new(store, clock.clone()));
        Ok(FeedGateway::new(service, clock, price, isobar_map))
    }
}

impl Default for SnapfeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}
