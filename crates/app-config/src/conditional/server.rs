use clap::Args;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = "Server options")]
pub struct ServerConfig {
    /// The port on which the server will listen.
    #[arg(long, default_value = "8000", env = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// The host on which the server will listen.
    #[arg(long, default_value = "127.0.0.1", env = "HOST")]
    pub host: String,

    /// Maximum number of scrape requests allowed per client per minute.
    #[arg(long, default_value = "30", env = "SCRAPER_HUB_RATE_LIMIT", value_parser = clap::value_parser!(u32).range(1..))]
    #[validate(range(min = 1))]
    pub rate_limit: u32,

    /// Maximum size of a proxied download, in bytes.
    #[arg(long, default_value = "536870912", env = "SCRAPER_HUB_MAX_PROXY_BYTES")]
    pub max_proxy_bytes: u64,
}
