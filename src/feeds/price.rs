//! Bitcoin/USD price feed backed by the CoinGecko API.
//!
//! See: <https://docs.coingecko.com/reference/coins-id>

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{FeedContext, FeedEnvelope, FeedItem, FeedSource, read_json, send};
use crate::cache::CachePolicy;
use crate::{FeedError, Result};

/// Default base URL for the CoinGecko API.
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";

/// Header carrying the demo-plan API key.
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

pub const CACHE_KEY: &str = "btc_feed";
pub const FRESHNESS: Duration = Duration::from_secs(60);
pub const OUTER_TTL: Duration = Duration::from_secs(120);
pub const MAX_AGE: Duration = Duration::from_secs(60);

const FEED_TITLE: &str = "Bitcoin USD Price Feed";
const HOME_PAGE_URL: &str = "https://laro.dev";
const ITEM_URL: &str = "https://www.coingecko.com/en/coins/bitcoin";
const AUTHOR: &str = "laro.dev";
const ATTRIBUTION: &str = "Price provided by CoinGecko. Feed created by laro.dev.";

#[derive(Deserialize)]
struct CoinResponse {
    market_data: MarketData,
}

#[derive(Deserialize)]
struct MarketData {
    current_price: CurrentPrice,
}

#[derive(Deserialize)]
struct CurrentPrice {
    usd: f64,
}

/// Feed of the current BTC price in USD.
#[derive(Clone)]
pub struct PriceFeed {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    policy: CachePolicy,
}

impl PriceFeed {
    /// Create a price feed using the shared HTTP client.
    ///
    /// Without an API key every fetch fails with
    /// [`FeedError::MissingApiKey`], which the feed service handles like
    /// any other upstream failure.
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            policy: CachePolicy {
                freshness: FRESHNESS,
                outer_ttl: OUTER_TTL,
            },
        }
    }

    /// Override the default 60s/120s cache policy.
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch the current USD price.
    pub async fn fetch_price(&self) -> Result<f64> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(FeedError::MissingApiKey("coingecko"))?;
        let url = format!("{}/api/v3/coins/bitcoin", self.base_url);

        let response = send(
            self.http
                .get(&url)
                .header("accept", "application/json")
                .header(API_KEY_HEADER, api_key),
        )
        .await?;

        let coin: CoinResponse = read_json(response).await?;
        let price = coin.market_data.current_price.usd;
        if !price.is_finite() {
            return Err(FeedError::UpstreamMalformed(format!(
                "non-finite price: {price}"
            )));
        }
        Ok(price)
    }
}

/// Build the single-item price envelope.
///
/// The item id and publish date are `now` in ISO-8601 UTC with millisecond
/// precision, so every fetch yields a new item.
pub fn build_envelope(price: f64, now: DateTime<Utc>, feed_url: &str) -> FeedEnvelope {
    let time = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let price = format!("{price:.2}");

    let item = FeedItem {
        id: time.clone(),
        url: ITEM_URL.to_string(),
        title: format!("BTC/USD: ${price}"),
        content_html: format!(
            "<p>Current Bitcoin price: <b>${price}</b> USD. {ATTRIBUTION}</p>"
        ),
        content_text: Some(format!("Current Bitcoin price: ${price} USD. {ATTRIBUTION}")),
        summary: Some(format!("Current Bitcoin price: ${price} USD. {ATTRIBUTION}")),
        date_published: time,
        author: Some(AUTHOR.to_string()),
        external_url: Some(HOME_PAGE_URL.to_string()),
    };

    FeedEnvelope::snapshot(
        FEED_TITLE,
        HOME_PAGE_URL,
        feed_url,
        format!("Current Bitcoin price in USD updated every minute. {ATTRIBUTION}"),
        item,
    )
}

#[async_trait]
impl FeedSource for PriceFeed {
    fn name(&self) -> &str {
        "btc-usd"
    }

    fn cache_key(&self) -> &str {
        CACHE_KEY
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn max_age(&self) -> Duration {
        MAX_AGE
    }

    fn failure_message(&self) -> &str {
        "Failed to fetch Bitcoin price"
    }

    async fn fetch(&self, ctx: &FeedContext) -> Result<FeedEnvelope> {
        let price = self.fetch_price().await?;
        Ok(build_envelope(price, ctx.now, &ctx.feed_url))
    }
}
