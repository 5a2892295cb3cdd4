//! Snapfeed error types

/// Snapfeed error types
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    // Upstream errors: all of these trigger stale fallback
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream error ({status}): {message}")]
    UpstreamError { status: u16, message: String },

    #[error("malformed upstream response: {0}")]
    UpstreamMalformed(String),

    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),

    /// Store read or write failure.
    ///
    /// Swallowed inside [`FreshnessCache`](crate::FreshnessCache); callers of
    /// the cache never see it.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FeedError {
    /// Whether this error came from talking to an upstream API.
    ///
    /// Upstream errors are the ones the feed service answers with a stale
    /// snapshot or a degraded rendering.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            FeedError::UpstreamUnreachable(_)
                | FeedError::UpstreamError { .. }
                | FeedError::UpstreamMalformed(_)
                | FeedError::MissingApiKey(_)
        )
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::UpstreamMalformed(err.to_string())
        } else if let Some(status) = err.status() {
            FeedError::UpstreamError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            FeedError::UpstreamUnreachable(err.to_string())
        }
    }
}

/// Result type alias for Snapfeed operations
pub type Result<T> = std::result::Result<T, FeedError>;
