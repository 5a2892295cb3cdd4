//! Gateway: the configured set of feeds behind one cache

mod builder;

pub use builder::{Snapfeed, SnapfeedBuilder};

use std::sync::Arc;

use crate::clock::Clock;
use crate::feeds::{FeedContext, FeedService, FeedSource, IsobarMapFeed, PriceFeed, Served};
use crate::Result;

/// The feeds this service knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Bitcoin/USD price, from CoinGecko.
    Price,
    /// AEMET surface isobar map.
    IsobarMap,
}

impl FeedKind {
    /// Every feed, in listing order.
    pub const ALL: [FeedKind; 2] = [FeedKind::Price, FeedKind::IsobarMap];

    /// URL path the feed is served at.
    pub fn path(self) -> &'static str {
        match self {
            FeedKind::Price => "/btc-usd.json",
            FeedKind::IsobarMap => "/aemet/mapa-isobaras.json",
        }
    }

    /// Look a feed up by its URL path.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.path() == path)
    }
}

/// The configured feeds sharing one [`FeedService`].
pub struct FeedGateway {
    service: FeedService,
    clock: Arc<dyn Clock>,
    price: PriceFeed,
    isobar_map: IsobarMapFeed,
}

impl FeedGateway {
    pub(crate) fn new(
        service: FeedService,
        clock: Arc<dyn Clock>,
        price: PriceFeed,
        isobar_map: IsobarMapFeed,
    ) -> Self {
        Self {
            service,
            clock,
            price,
            isobar_map,
        }
    }

    /// The source behind a feed kind.
    pub fn source(&self, kind: FeedKind) -> &dyn FeedSource {
        match kind {
            FeedKind::Price => &self.price,
            FeedKind::IsobarMap => &self.isobar_map,
        }
    }

    /// Serve a feed whose canonical URL is `feed_url`.
    pub async fn serve(&self, kind: FeedKind, feed_url: &str) -> Result<Served> {
        let ctx = FeedContext::new(feed_url, self.clock.now());
        self.service.serve(self.source(kind), &ctx).await
    }

    /// The shared feed service.
    pub fn service(&self) -> &FeedService {
        &self.service
    }
}
