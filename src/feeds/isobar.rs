//! AEMET surface-analysis (isobar) map feed.
//!
//! AEMET OpenData answers a metadata request with a short-lived link to the
//! actual image; the feed fetches both and embeds the image inline.
//!
//! # Editorial reference time
//!
//! AEMET publishes the analysis twice a day. The map on offer before noon
//! (Madrid time) is yesterday's 12:00 analysis; from noon on it is today's
//! 00:00 one. Titles and item ids carry that reference, not the fetch time.
//!
//! # Orientation
//!
//! The upstream image is delivered lying on its side. When the probe knows
//! its size, the feed wraps it in an SVG sized to the rotated dimensions and
//! rotates the coordinate space a quarter turn counter-clockwise. Otherwise
//! it falls back to the same quarter turn in CSS, anchored at the top-left
//! corner and shifted back down by the image's own width. The CSS path
//! turns the image the same way but cannot reserve the right amount of
//! space.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Europe::Madrid;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::{FeedContext, FeedEnvelope, FeedItem, FeedSource, read_json, send};
use crate::cache::CachePolicy;
use crate::probe::{DEFAULT_CONTENT_TYPE, ImageDescriptor, media_type};
use crate::{FeedError, Result};

/// Default base URL for AEMET OpenData.
pub const DEFAULT_BASE_URL: &str = "https://opendata.aemet.es/opendata";

const ANALYSIS_PATH: &str = "/api/mapasygraficos/analisis";
const API_KEY_HEADER: &str = "api_key";

pub const CACHE_KEY: &str = "aemet_isobaras_feed";
pub const FRESHNESS: Duration = Duration::from_secs(3 * 3600);
pub const OUTER_TTL: Duration = Duration::from_secs(6 * 3600);
pub const MAX_AGE: Duration = Duration::from_secs(1800);

const FEED_TITLE: &str = "AEMET Mapa de isobaras";
const HOME_PAGE_URL: &str = "https://laro.dev";
const ITEM_URL: &str = "https://www.aemet.es/es/eltiempo/prediccion/mapa_frentes";
const AUTHOR: &str = "laro.dev";
const ATTRIBUTION: &str = "Mapa proporcionado por AEMET. Feed created by laro.dev.";

/// AEMET OpenData envelope. `datos` links to the payload itself.
#[derive(Deserialize)]
struct AemetMetadata {
    #[serde(default)]
    descripcion: Option<String>,
    estado: u16,
    #[serde(default)]
    datos: Option<String>,
}

/// Feed of the latest AEMET isobar map.
#[derive(Clone)]
pub struct IsobarMapFeed {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    policy: CachePolicy,
}

impl IsobarMapFeed {
    /// Create an isobar map feed using the shared HTTP client.
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

    /// Override the default 3h/6h cache policy.
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve the current map link and download the image.
    pub async fn fetch_image(&self) -> Result<ImageDescriptor> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(FeedError::MissingApiKey("aemet"))?;
        let url = format!("{}{}", self.base_url, ANALYSIS_PATH);

        let response = send(
            self.http
                .get(&url)
                .header("accept", "application/json")
                .header(API_KEY_HEADER, api_key),
        )
        .await?;
        let metadata: AemetMetadata = read_json(response).await?;

        if metadata.estado != 200 {
            return Err(FeedError::UpstreamError {
                status: metadata.estado,
                message: metadata.descripcion.unwrap_or_default(),
            });
        }
        let image_url = metadata
            .datos
            .ok_or_else(|| FeedError::UpstreamMalformed("metadata has no `datos` link".into()))?;

        let response = send(self.http.get(&image_url)).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(media_type)
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FeedError::UpstreamMalformed("empty image body".into()));
        }

        Ok(ImageDescriptor::from_bytes(content_type, bytes.to_vec()))
    }

    fn envelope(&self, image: &ImageDescriptor, ctx: &FeedContext) -> FeedEnvelope {
        let local_now = ctx.now.with_timezone(&Madrid).naive_local();
        let reference = map_reference(local_now);
        let published = Madrid
            .from_local_datetime(&reference)
            .earliest()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| ctx.now.to_rfc3339());
        build_envelope(image, reference, &published, &ctx.feed_url)
    }
}

/// Reference time of the map on offer at local time `now`.
///
/// Before 12:00 that is yesterday at 12:00; from 12:00 on, today at 00:00.
pub fn map_reference(now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date();
    if now.time() < NaiveTime::MIN + chrono::Duration::hours(12) {
        let yesterday = today.pred_opt().unwrap_or(today);
        yesterday.and_time(NaiveTime::MIN + chrono::Duration::hours(12))
    } else {
        today.and_time(NaiveTime::MIN)
    }
}

/// HTML embedding `image` rotated upright.
pub fn render_html(image: &ImageDescriptor, alt: &str) -> String {
    let uri = image.data_uri();
    match image.dimensions() {
        Some(dims) => {
            let (w, h) = (dims.width, dims.height);
            format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{h}" height="{w}" viewBox="0 0 {h} {w}" role="img" aria-label="{alt}"><image width="{w}" height="{h}" transform="rotate(-90) translate(-{w} 0)" href="{uri}"/></svg>"#
            )
        }
        None => format!(
            r#"<img src="{uri}" alt="{alt}" style="transform: rotate(-90deg) translateX(-100%); transform-origin: top left;"/>"#
        ),
    }
}

/// Build the single-item map envelope.
pub fn build_envelope(
    image: &ImageDescriptor,
    reference: NaiveDateTime,
    published: &str,
    feed_url: &str,
) -> FeedEnvelope {
    let label = reference.format("%d/%m/%Y %H:%M").to_string();
    let title = format!("Mapa de isobaras de superficie ({label})");
    let text = format!("Mapa de isobaras de superficie de AEMET para el {label}. {ATTRIBUTION}");

    let item = FeedItem {
        id: format!("aemet-isobaras-{}", reference.format("%Y-%m-%dT%H:%M")),
        url: ITEM_URL.to_string(),
        title: title.clone(),
        content_html: format!("{}<p>{text}</p>", render_html(image, &title)),
        content_text: Some(text.clone()),
        summary: Some(text),
        date_published: published.to_string(),
        author: Some(AUTHOR.to_string()),
        external_url: Some(HOME_PAGE_URL.to_string()),
    };

    FeedEnvelope::snapshot(
        FEED_TITLE,
        HOME_PAGE_URL,
        feed_url,
        format!("Mapa de isobaras de superficie publicado por AEMET dos veces al día. {ATTRIBUTION}"),
        item,
    )
}

#[async_trait]
impl FeedSource for IsobarMapFeed {
    fn name(&self) -> &str {
        "aemet-isobaras"
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
        "Failed to fetch AEMET isobar map"
    }

    async fn fetch(&self, ctx: &FeedContext) -> Result<FeedEnvelope> {
        let image = self.fetch_image().await?;
        Ok(self.envelope(&image, ctx))
    }

    /// The map rendered around a blank 1x1 placeholder.
    fn degraded(&self, ctx: &FeedContext, _error: &FeedError) -> Option<FeedEnvelope> {
        Some(self.envelope(&ImageDescriptor::placeholder(), ctx))
    }
}
