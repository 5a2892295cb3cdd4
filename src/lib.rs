//! Snapfeed - cached JSON Feed snapshots of third-party APIs
//!
//! Each feed is a single-item [JSON Feed](https://jsonfeed.org/version/1)
//! rebuilt from an upstream API. Results are kept in a key-value store
//! behind a freshness window; when the upstream fails, the last stored
//! snapshot is served instead of an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use snapfeed::{FeedKind, Snapfeed};
//!
//! #[tokio::main]
//! async fn main() -> snapfeed::Result<()> {
//!     let gateway = Snapfeed::builder()
//!         .coingecko_key("CG-your-key")
//!         .build()?;
//!
//!     let served = gateway
//!         .serve(FeedKind::Price, "https://feeds.example/btc-usd.json")
//!         .await?;
//!
//!     println!("{}", served.envelope.items[0].title);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod error;
pub mod feeds;
pub mod gateway;
pub mod probe;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheEntry, CachePolicy, FreshnessCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FeedError, Result};
pub use feeds::{
    FeedContext, FeedEnvelope, FeedItem, FeedService, FeedSource, IsobarMapFeed, Origin,
    PriceFeed, Served,
};
pub use gateway::{FeedGateway, FeedKind, Snapfeed, SnapfeedBuilder};
pub use probe::{Dimensions, ImageDescriptor, probe};
pub use store::{KvStore, MemoryStore, StoreConfig};
pub use version::{BuildInfo, PKG_VERSION, version_string};
