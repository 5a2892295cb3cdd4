//! HTTP front door.
//!
//! A thin axum router over [`FeedGateway`]:
//!
//! | path                         | response                                  |
//! |------------------------------|-------------------------------------------|
//! | `/favicon.ico`               | static SVG, cached for a day              |
//! | `/btc-usd.json`              | price feed                                |
//! | `/aemet/mapa-isobaras.json`  | isobar map feed                           |
//! | anything else                | 200 with the list of feed endpoints       |
//!
//! Fresh feeds advertise the feed's `max-age`; stale and degraded ones are
//! sent with `no-cache`. A feed that cannot be served at all is a 502 with
//! `{"error": "..."}`.

pub mod config;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use tracing::{debug, error};

use crate::{FeedGateway, FeedKind, Served};

const FAVICON_SVG: &str = include_str!("favicon.svg");
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Shared router state.
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<FeedGateway>,
    public_url: Option<String>,
}

impl AppState {
    /// `public_url` overrides the request `Host` when building `feed_url`.
    pub fn new(gateway: Arc<FeedGateway>, public_url: Option<String>) -> Self {
        Self {
            gateway,
            public_url: public_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn feed_url(&self, headers: &HeaderMap, uri: &Uri) -> String {
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        match &self.public_url {
            Some(base) => format!("{base}{path}"),
            None => {
                let host = headers
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or("localhost");
                format!("http://{host}{path}")
            }
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/favicon.ico", get(favicon))
        .route(FeedKind::Price.path(), get(price_feed))
        .route(FeedKind::IsobarMap.path(), get(isobar_map_feed))
        .fallback(endpoints)
        .with_state(state)
}

async fn favicon() -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, "image/svg+xml"),
            (CACHE_CONTROL, "public, max-age=86400"),
        ],
        FAVICON_SVG,
    )
}

async fn price_feed(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    serve_feed(&state, FeedKind::Price, &headers, &uri).await
}

async fn isobar_map_feed(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    serve_feed(&state, FeedKind::IsobarMap, &headers, &uri).await
}

async fn serve_feed(state: &AppState, kind: FeedKind, headers: &HeaderMap, uri: &Uri) -> Response {
    let feed_url = state.feed_url(headers, uri);
    match state.gateway.serve(kind, &feed_url).await {
        Ok(served) => feed_response(state, kind, served),
        Err(e) => {
            error!(feed = ?kind, error = %e, "feed unavailable");
            let message = state.gateway.source(kind).failure_message();
            error_response(StatusCode::BAD_GATEWAY, message)
        }
    }
}

fn feed_response(state: &AppState, kind: FeedKind, served: Served) -> Response {
    let body = match serde_json::to_string_pretty(&served.envelope) {
        Ok(body) => body,
        Err(e) => {
            error!(feed = ?kind, error = %e, "failed to encode feed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode feed");
        }
    };
    debug!(feed = ?kind, origin = ?served.origin, "serving feed");

    let cache_control = if served.origin.is_fresh() {
        let max_age = state.gateway.source(kind).max_age().as_secs();
        format!("public, max-age={max_age}")
    } else {
        "no-cache".to_string()
    };

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(CACHE_CONTROL, value);
    }
    response
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = json!({ "error": message }).to_string();
    (status, [(CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}

async fn endpoints() -> Response {
    let body = json!({
        "message": "Unknown endpoint. Available feeds:",
        "endpoints": FeedKind::ALL.iter().map(|kind| kind.path()).collect::<Vec<_>>(),
    });
    let body = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
    (StatusCode::OK, [(CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}
