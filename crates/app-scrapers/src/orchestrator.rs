use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use tracing::{debug, warn};
use url::Url;

use crate::{
    common::{scrape_request::ScrapeRequest, scrape_result::ScrapeResult},
    error::ScrapeError,
    fallback::{AggregatorApi, FallbackProvider},
    normalizer::normalize,
    platform::Platform,
    scraper::PlatformScraper,
    strategies::available_scrapers,
};

static GLOBAL: Lazy<UnifiedScraper> = Lazy::new(UnifiedScraper::default);

/// Routes URLs to their platform scraper and owns the two-tier fallback:
/// local strategies first, the remote aggregator last, never the reverse.
#[derive(Debug)]
pub struct UnifiedScraper {
    scrapers: HashMap<Platform, PlatformScraper>,
    fallback: Arc<dyn FallbackProvider>,
}

impl Default for UnifiedScraper {
    fn default() -> Self {
        Self::new(available_scrapers(), Arc::new(AggregatorApi))
    }
}

impl UnifiedScraper {
    #[must_use]
    pub fn new(
        scrapers: HashMap<Platform, PlatformScraper>,
        fallback: Arc<dyn FallbackProvider>,
    ) -> Self {
        Self { scrapers, fallback }
    }

    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Extract media info for a URL.
    ///
    /// A malformed URL fails immediately; no strategy or fallback sees it.
    pub async fn extract(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        let url = Url::parse(url)?;
        let platform = Platform::from_url(&url);

        let mut reasons = Vec::new();

        if let Some(scraper) = self.scrapers.get(&platform) {
            let request = ScrapeRequest::from(&url);

            match scraper.scrape(&request).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(%platform, error = %e, "All local strategies failed");
                    reasons.extend(e.reasons());
                }
            }
        } else {
            debug!(%platform, "No local scraper registered");
            reasons.push(format!("no local scraper registered for {platform}"));
        }

        match self.fallback.fetch(&url).await {
            Ok(raw) => {
                let result = normalize(&raw, platform);

                if result.has_usable_variant() {
                    return Ok(result);
                }

                reasons.push(format!(
                    "{}: document contained no usable variants",
                    self.fallback.name()
                ));

                Err(ScrapeError::ExtractionFailed { platform, reasons })
            }
            Err(e) => {
                warn!(%platform, error = %e, "External fallback failed");
                reasons.push(format!("{}: {e}", self.fallback.name()));

                Err(ScrapeError::ExtractionFailed { platform, reasons })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        error::{FallbackError, StrategyError},
        strategies::{Strategy, StrategyEntry},
    };

    #[derive(Debug)]
    struct FailingStrategy {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Strategy for FailingStrategy {
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
    struct CannedFallback {
        calls: Arc<AtomicU32>,
        document: Value,
    }

    #[async_trait::async_trait]
    impl FallbackProvider for CannedFallback {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn fetch(&self, _url: &Url) -> Result<Value, FallbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.document.clone())
        }
    }

    #[derive(Debug)]
    struct BrokenFallback {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl FallbackProvider for BrokenFallback {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn fetch(&self, _url: &Url) -> Result<Value, FallbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FallbackError::Decode("bad document".to_string()))
        }
    }

    fn usable_document() -> Value {
        json!({
            "title": "A video",
            "formats": [
                { "quality": "720p", "ext": "mp4", "vcodec": "h264", "url": "https://cdn.example.com/v.mp4" },
            ],
        })
    }

    fn registry_with_failing_strategies(
        calls: &[Arc<AtomicU32>],
    ) -> HashMap<Platform, PlatformScraper> {
        let strategies = calls
            .iter()
            .map(|x| Arc::new(FailingStrategy { calls: x.clone() }) as StrategyEntry)
            .collect();

        let scraper = PlatformScraper::new(Platform::Youtube, strategies);

        [(Platform::Youtube, scraper)].into_iter().collect()
    }

    #[tokio::test]
    async fn consults_fallback_exactly_once_after_total_strategy_failure() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let fallback_calls = Arc::new(AtomicU32::new(0));

        let scraper = UnifiedScraper::new(
            registry_with_failing_strategies(&[first.clone(), second.clone()]),
            Arc::new(CannedFallback {
                calls: fallback_calls.clone(),
                document: usable_document(),
            }),
        );

        let result = scraper
            .extract("https://www.youtube.com/watch?v=abc")
            .await
            .expect("Expected the fallback result");

        assert_eq!(result.title, "A video");
        assert!(result.has_usable_variant());

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_platforms_go_straight_to_the_fallback() {
        let fallback_calls = Arc::new(AtomicU32::new(0));

        let scraper = UnifiedScraper::new(
            HashMap::new(),
            Arc::new(CannedFallback {
                calls: fallback_calls.clone(),
                document: usable_document(),
            }),
        );

        let result = scraper
            .extract("https://example.com/some/video")
            .await
            .expect("Expected the fallback result");

        assert_eq!(result.platform, "Unknown");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unusable_fallback_documents_are_terminal_failures() {
        let fallback_calls = Arc::new(AtomicU32::new(0));

        let scraper = UnifiedScraper::new(
            HashMap::new(),
            Arc::new(CannedFallback {
                calls: fallback_calls.clone(),
                document: json!({ "title": "no formats here" }),
            }),
        );

        let err = scraper
            .extract("https://example.com/some/video")
            .await
            .expect_err("Expected a terminal failure");

        assert!(matches!(err, ScrapeError::ExtractionFailed { .. }));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_errors_carry_every_collected_reason() {
        let strategy_calls = Arc::new(AtomicU32::new(0));
        let fallback_calls = Arc::new(AtomicU32::new(0));

        let scraper = UnifiedScraper::new(
            registry_with_failing_strategies(&[strategy_calls.clone()]),
            Arc::new(BrokenFallback {
                calls: fallback_calls.clone(),
            }),
        );

        let err = scraper
            .extract("https://www.youtube.com/watch?v=abc")
            .await
            .expect_err("Expected a terminal failure");

        match err {
            ScrapeError::ExtractionFailed { platform, reasons } => {
                assert_eq!(platform, Platform::Youtube);
                assert_eq!(reasons.len(), 2);
            }
            other => panic!("Expected ExtractionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_urls_fail_before_anything_runs() {
        let strategy_calls = Arc::new(AtomicU32::new(0));
        let fallback_calls = Arc::new(AtomicU32::new(0));

        let scraper = UnifiedScraper::new(
            registry_with_failing_strategies(&[strategy_calls.clone()]),
            Arc::new(CannedFallback {
                calls: fallback_calls.clone(),
                document: usable_document(),
            }),
        );

        let err = scraper
            .extract("definitely not a url")
            .await
            .expect_err("Expected a validation failure");

        assert!(matches!(err, ScrapeError::InvalidUrl(_)));
        assert_eq!(strategy_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }
}
