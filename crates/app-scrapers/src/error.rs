use std::time::Duration;

use thiserror::Error;

use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response status: {0}")]
    Status(http::StatusCode),
}

/// Failure of a single extraction strategy.
///
/// Recovered by the owning [`crate::PlatformScraper`], which moves on to the
/// next strategy in line.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unexpected response shape: {0}")]
    Parse(String),
    #[error("no usable media found: {0}")]
    NoMedia(String),
    #[error("content is inaccessible: {0}")]
    Blocked(String),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
#[error("every strategy failed for {platform}")]
pub struct AllStrategiesFailed {
    pub platform: Platform,
    pub failures: Vec<(&'static str, StrategyError)>,
}
impl AllStrategiesFailed {
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|(name, e)| format!("{name}: {e}"))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("no fallback endpoint is configured")]
    NotConfigured,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("fallback returned an unreadable document: {0}")]
    Decode(String),
}

/// Terminal extraction outcome surfaced to callers.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("could not extract media info for {platform}")]
    ExtractionFailed {
        platform: Platform,
        reasons: Vec<String>,
    },
}
