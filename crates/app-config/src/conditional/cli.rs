use clap::Args;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = "Cli options")]
pub struct CliConfig {
    /// URLs to extract media info from.
    ///
    /// Each URL is processed independently.
    /// Invalid URLs are reported and counted as failures.
    #[clap(id = "URL")]
    #[serde(skip)]
    pub urls: Vec<String>,

    /// Print the results as compact JSON instead of pretty-printed JSON.
    #[clap(long)]
    pub compact: bool,
}
