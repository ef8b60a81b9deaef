use std::time::Duration;

use clap::{Args, ValueEnum, ValueHint};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, ValueEnum)]
pub enum DumpConfigType {
    Json,
    Toml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[allow(clippy::option_option)]
#[clap(next_help_heading = Some("Run options"))]
pub struct RunConfig {
    /// Dump the config to stdout
    #[arg(long, value_enum, default_value = None)]
    pub dump_config: Option<Option<DumpConfigType>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = Some("Scraper options"))]
pub struct ScraperConfig {
    /// Per-attempt timeout for outbound scraping requests, in milliseconds.
    ///
    /// A request that exceeds the timeout is aborted and retried.
    #[arg(long, default_value = "10000", env = "SCRAPER_HUB_REQUEST_TIMEOUT_MS", value_parser = clap::value_parser!(u64).range(1..))]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,

    /// How many times a single outbound request is attempted before giving up.
    #[arg(long, default_value = "3", env = "SCRAPER_HUB_MAX_ATTEMPTS", value_parser = clap::value_parser!(u32).range(1..))]
    #[validate(range(min = 1))]
    pub max_attempts: u32,

    /// Base delay between request retries, in milliseconds.
    ///
    /// The n-th retry waits n times this long.
    #[arg(long, default_value = "1000", env = "SCRAPER_HUB_BACKOFF_BASE_MS")]
    pub backoff_base_ms: u64,

    /// Override the default browser user agent sent with outbound requests.
    #[arg(long, env = "SCRAPER_HUB_USER_AGENT")]
    pub user_agent: Option<String>,
}
impl ScraperConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = Some("External endpoints/APIs"))]
pub struct EndpointConfig {
    /// Base URL of the external aggregator API used when every local
    /// scraping strategy fails.
    ///
    /// If not provided, the external fallback is disabled.
    #[arg(long, env = "SCRAPER_HUB_FALLBACK_API_URL", value_hint = ValueHint::Url, value_parser = validate_absolute_url())]
    #[validate(custom(function = "absolute_url"))]
    pub fallback_api_url: Option<String>,

    /// API key sent to the external aggregator API.
    #[arg(long, env = "SCRAPER_HUB_FALLBACK_API_KEY")]
    pub fallback_api_key: Option<String>,
}

#[must_use]
pub fn validate_absolute_url() -> impl clap::builder::TypedValueParser {
    move |s: &str| {
        let parsed = match Url::parse(s) {
            Ok(parsed) => parsed,
            Err(e) => return Err(format!("URL must be absolute: {e}")),
        };

        if parsed.cannot_be_a_base() {
            return Err("URL must be absolute".to_string());
        }

        Ok(s.trim_end_matches('/').to_string())
    }
}

pub fn absolute_url<T>(url: T) -> Result<(), ValidationError>
where
    T: AsRef<str>,
{
    let parsed =
        Url::parse(url.as_ref()).map_err(|_| ValidationError::new("Invalid URL"))?;

    if parsed.cannot_be_a_base() {
        return Err(ValidationError::new("URL must be absolute"));
    }

    Ok(())
}
