use tracing::{debug, warn};

use crate::{
    common::{scrape_request::ScrapeRequest, scrape_result::ScrapeResult},
    error::{AllStrategiesFailed, StrategyError},
    platform::Platform,
    strategies::StrategyEntry,
};

/// Ordered strategies for a single platform.
///
/// Strategies run strictly one after another, each at most once per call.
/// The first result carrying a usable variant is returned verbatim; a
/// result without one counts as a failure of that strategy.
#[derive(Debug, Clone)]
pub struct PlatformScraper {
    platform: Platform,
    strategies: Vec<StrategyEntry>,
}

impl PlatformScraper {
    #[must_use]
    pub fn new(platform: Platform, strategies: Vec<StrategyEntry>) -> Self {
        Self {
            platform,
            strategies,
        }
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    pub async fn scrape(
        &self,
        request: &ScrapeRequest,
    ) -> Result<ScrapeResult, AllStrategiesFailed> {
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            debug!(
                strategy = strategy.name(),
                platform = %self.platform,
                "Attempting strategy"
            );

            match strategy.attempt(request).await {
                Ok(result) if result.has_usable_variant() => {
                    debug!(strategy = strategy.name(), "Strategy produced a usable result");
                    return Ok(result);
                }
                Ok(_) => {
                    warn!(strategy = strategy.name(), "Strategy returned no usable variants");
                    failures.push((
                        strategy.name(),
                        StrategyError::NoMedia("result contained no usable variants".to_string()),
                    ));
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Strategy failed");
                    failures.push((strategy.name(), e));
                }
            }
        }

        Err(AllStrategiesFailed {
            platform: self.platform,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;
    use crate::{
        common::scrape_result::{MediaKind, MediaVariant, UNRESOLVED_URL},
        strategies::Strategy,
    };

    #[derive(Debug)]
    struct Failing {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Strategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn description(&self) -> &'static str {
            "always fails"
        }

        async fn attempt(&self, _request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StrategyError::Parse("boom".to_string()))
        }
    }

    #[derive(Debug)]
    struct Unresolved {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Strategy for Unresolved {
        fn name(&self) -> &'static str {
            "unresolved"
        }

        fn description(&self) -> &'static str {
            "succeeds without a usable variant"
        }

        async fn attempt(&self, _request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let mut result = ScrapeResult::new(Platform::Tiktok);
            result
                .variants
                .push(MediaVariant::new("HD", "mp4", MediaKind::Video, UNRESOLVED_URL));
            Ok(result)
        }
    }

    #[derive(Debug)]
    struct Succeeding {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Strategy for Succeeding {
        fn name(&self) -> &'static str {
            "succeeding"
        }

        fn description(&self) -> &'static str {
            "always succeeds"
        }

        async fn attempt(&self, _request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let mut result = ScrapeResult::new(Platform::Tiktok);
            result.variants.push(MediaVariant::new(
                "HD",
                "mp4",
                MediaKind::Video,
                "https://cdn.example.com/v.mp4",
            ));
            Ok(result)
        }
    }

    fn request() -> ScrapeRequest {
        ScrapeRequest::try_from("https://www.tiktok.com/@user/video/1").expect("Invalid test URL")
    }

    #[tokio::test]
    async fn first_usable_result_short_circuits() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let scraper = PlatformScraper::new(
            Platform::Tiktok,
            vec![
                Arc::new(Succeeding {
                    calls: first.clone(),
                }) as StrategyEntry,
                Arc::new(Failing {
                    calls: second.clone(),
                }),
            ],
        );

        let result = scraper.scrape(&request()).await.expect("Expected success");

        assert!(result.has_usable_variant());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_fall_through_to_the_next_strategy() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let scraper = PlatformScraper::new(
            Platform::Tiktok,
            vec![
                Arc::new(Failing {
                    calls: first.clone(),
                }) as StrategyEntry,
                Arc::new(Succeeding {
                    calls: second.clone(),
                }),
            ],
        );

        let result = scraper.scrape(&request()).await.expect("Expected success");

        assert!(result.has_usable_variant());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unusable_results_count_as_failures() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let scraper = PlatformScraper::new(
            Platform::Tiktok,
            vec![
                Arc::new(Unresolved {
                    calls: first.clone(),
                }) as StrategyEntry,
                Arc::new(Succeeding {
                    calls: second.clone(),
                }),
            ],
        );

        let result = scraper.scrape(&request()).await.expect("Expected success");

        assert!(result.has_usable_variant());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_strategy_runs_exactly_once_before_total_failure() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let scraper = PlatformScraper::new(
            Platform::Tiktok,
            vec![
                Arc::new(Failing {
                    calls: first.clone(),
                }) as StrategyEntry,
                Arc::new(Unresolved {
                    calls: second.clone(),
                }),
            ],
        );

        let err = scraper
            .scrape(&request())
            .await
            .expect_err("Expected total failure");

        assert_eq!(err.platform, Platform::Tiktok);
        assert_eq!(err.failures.len(), 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
