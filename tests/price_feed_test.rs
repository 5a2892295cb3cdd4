//! Wiremock integration tests for the CoinGecko price feed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snapfeed::{FeedError, FeedKind, ManualClock, Origin, PriceFeed, Snapfeed};

const FEED_URL: &str = "https://feeds.test/btc-usd.json";

fn coin_json(usd: f64) -> serde_json::Value {
    serde_json::json!({
        "id": "bitcoin",
        "symbol": "btc",
        "market_data": {
            "current_price": { "usd": usd, "eur": usd * 0.9 }
        }
    })
}

async fn mount_price(server: &MockServer, usd: f64) {
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin"))
        .and(header("x-cg-demo-api-key", "cg-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(coin_json(usd)))
        .mount(server)
        .await;
}

fn feed(server: &MockServer, key: Option<&str>) -> PriceFeed {
    PriceFeed::new(
        reqwest::Client::new(),
        server.uri(),
        key.map(str::to_string),
    )
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap(),
    ))
}

// ============================================================================
// PriceFeed::fetch_price
// ============================================================================

#[tokio::test]
async fn fetch_price_reads_usd_quote() {
    let server = MockServer::start().await;
    mount_price(&server, 67_234.5).await;

    let price = feed(&server, Some("cg-test-key")).fetch_price().await.unwrap();
    assert_eq!(price, 67_234.5);
}

#[tokio::test]
async fn missing_key_never_calls_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(coin_json(1.0)))
        .expect(0)
        .mount(&server)
        .await;

    let err = feed(&server, None).fetch_price().await.unwrap_err();
    assert!(matches!(err, FeedError::MissingApiKey("coingecko")));
}

#[tokio::test]
async fn non_2xx_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = feed(&server, Some("cg-test-key"))
        .fetch_price()
        .await
        .unwrap_err();
    match err {
        FeedError::UpstreamError { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "rate limited");
        }
        other => panic!("expected UpstreamError, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_price_field_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"market_data": {"current_price": {}}})),
        )
        .mount(&server)
        .await;

    let err = feed(&server, Some("cg-test-key"))
        .fetch_price()
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::UpstreamMalformed(_)));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = feed(&server, Some("cg-test-key"))
        .fetch_price()
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::UpstreamMalformed(_)));
}

// ============================================================================
// Through the gateway
// ============================================================================

#[tokio::test]
async fn gateway_serves_price_envelope() {
    let server = MockServer::start().await;
    mount_price(&server, 50_000.0).await;

    let gateway = Snapfeed::builder()
        .coingecko_key("cg-test-key")
        .coingecko_base_url(server.uri())
        .clock(clock())
        .build()
        .unwrap();

    let served = gateway.serve(FeedKind::Price, FEED_URL).await.unwrap();
    assert_eq!(served.origin, Origin::Upstream);

    let feed = &served.envelope;
    assert_eq!(feed.version, "https://jsonfeed.org/version/1");
    assert_eq!(feed.feed_url, FEED_URL);
    assert_eq!(feed.items.len(), 1);
    assert_eq!(feed.items[0].title, "BTC/USD: $50000.00");
    assert_eq!(feed.items[0].id, "2026-10-17T09:30:00.000Z");
}

#[tokio::test]
async fn gateway_reuses_fresh_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(coin_json(50_000.0)))
        .expect(1)
        .mount(&server)
        .await;

    let clock = clock();
    let gateway = Snapfeed::builder()
        .coingecko_key("cg-test-key")
        .coingecko_base_url(server.uri())
        .clock(clock.clone())
        .build()
        .unwrap();

    let first = gateway.serve(FeedKind::Price, FEED_URL).await.unwrap();
    clock.advance(Duration::from_secs(59));
    let second = gateway.serve(FeedKind::Price, FEED_URL).await.unwrap();

    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(second.envelope, first.envelope);
    // MockServer verifies `expect(1)` on drop.
}

#[tokio::test]
async fn gateway_falls_back_to_stale_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(coin_json(50_000.0)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let clock = clock();
    let gateway = Snapfeed::builder()
        .coingecko_key("cg-test-key")
        .coingecko_base_url(server.uri())
        .clock(clock.clone())
        .build()
        .unwrap();

    let first = gateway.serve(FeedKind::Price, FEED_URL).await.unwrap();
    clock.advance(Duration::from_secs(75));
    let second = gateway.serve(FeedKind::Price, FEED_URL).await.unwrap();

    assert_eq!(second.origin, Origin::Stale);
    assert_eq!(second.envelope, first.envelope);
}

#[tokio::test]
async fn gateway_price_error_without_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = Snapfeed::builder()
        .coingecko_key("cg-test-key")
        .coingecko_base_url(server.uri())
        .build()
        .unwrap();

    let err = gateway.serve(FeedKind::Price, FEED_URL).await.unwrap_err();
    assert!(err.is_upstream());
    assert_eq!(
        gateway.source(FeedKind::Price).failure_message(),
        "Failed to fetch Bitcoin price"
    );
}
