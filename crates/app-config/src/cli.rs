use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

use crate::common;

/// Extract video metadata and downloadable media links
/// from social/video platform URLs.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[clap(disable_help_flag = true)]
pub struct CliArgs {
    /// Print help
    #[clap(action = ArgAction::Help, long)]
    help: Option<bool>,

    #[command(flatten)]
    pub run: common::RunConfig,

    #[command(flatten)]
    pub scraper: common::ScraperConfig,

    #[command(flatten)]
    pub endpoint: common::EndpointConfig,

    #[command(flatten)]
    pub conditional: crate::conditional::ConditionalConfig,
}
