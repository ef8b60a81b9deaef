pub use common::{
    request::{fetch_with_retry, Client, FetchBody, FetchOptions, USER_AGENT},
    scrape_request::ScrapeRequest,
    scrape_result::{
        MediaKind, MediaVariant, ScrapeResult, PLACEHOLDER_THUMBNAIL, UNRESOLVED_URL,
    },
};
pub use error::{AllStrategiesFailed, FallbackError, FetchError, ScrapeError, StrategyError};
pub use normalizer::normalize;
pub use orchestrator::UnifiedScraper;
pub use platform::Platform;
pub use scraper::PlatformScraper;

mod common;
mod error;
pub mod fallback;
pub mod format;
mod normalizer;
mod orchestrator;
mod platform;
mod scraper;
pub mod strategies;

/// Extract media info for a URL using the default scraper registry.
#[tracing::instrument]
pub async fn extract(url: &str) -> Result<ScrapeResult, ScrapeError> {
    UnifiedScraper::global().extract(url).await
}
