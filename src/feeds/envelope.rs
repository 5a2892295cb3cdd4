//! JSON Feed v1 document types.
//!
//! See <https://jsonfeed.org/version/1>. Only the fields the snapshot feeds
//! use are modelled; optional ones are omitted from the output when unset.

use serde::{Deserialize, Serialize};

/// Value of the `version` field for JSON Feed v1.
pub const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1";

/// A JSON Feed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEnvelope {
    pub version: String,
    pub title: String,
    pub home_page_url: String,
    pub feed_url: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

impl FeedEnvelope {
    /// A v1 envelope holding exactly one item.
    pub fn snapshot(
        title: impl Into<String>,
        home_page_url: impl Into<String>,
        feed_url: impl Into<String>,
        description: impl Into<String>,
        item: FeedItem,
    ) -> Self {
        Self {
            version: JSON_FEED_VERSION.to_string(),
            title: title.into(),
            home_page_url: home_page_url.into(),
            feed_url: feed_url.into(),
            description: description.into(),
            items: vec![item],
        }
    }
}

/// One entry of a [`FeedEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content_html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub date_published: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}
