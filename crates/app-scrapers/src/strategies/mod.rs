pub mod instagram;
pub mod tiktok;
pub mod twitter;
pub mod youtube;

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::{
    common::{scrape_request::ScrapeRequest, scrape_result::ScrapeResult},
    error::StrategyError,
    platform::Platform,
    scraper::PlatformScraper,
};

/// One concrete technique for extracting media info from one platform.
///
/// Implementations must never assume a field is present: a missing optional
/// field means "try something else", not a panic. Only a total inability to
/// find a media pointer is an error.
#[async_trait::async_trait]
pub trait Strategy: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError>;
}

pub type StrategyEntry = Arc<dyn Strategy>;

/// Platform scrapers with their strategies in priority order.
#[must_use]
pub fn available_scrapers() -> HashMap<Platform, PlatformScraper> {
    let scrapers = [
        PlatformScraper::new(
            Platform::Youtube,
            vec![
                Arc::new(youtube::PlayerApi) as StrategyEntry,
                Arc::new(youtube::EmbedPage),
                Arc::new(youtube::VideoInfo),
            ],
        ),
        PlatformScraper::new(
            Platform::Tiktok,
            vec![
                Arc::new(tiktok::Oembed) as StrategyEntry,
                Arc::new(tiktok::WebPage),
                Arc::new(tiktok::MobileApi),
            ],
        ),
        PlatformScraper::new(
            Platform::Instagram,
            vec![
                Arc::new(instagram::GraphApi) as StrategyEntry,
                Arc::new(instagram::WebPage),
            ],
        ),
        PlatformScraper::new(
            Platform::Twitter,
            vec![
                Arc::new(twitter::GuestApi) as StrategyEntry,
                Arc::new(twitter::Syndication),
            ],
        ),
    ];

    scrapers.into_iter().map(|x| (x.platform(), x)).collect()
}
