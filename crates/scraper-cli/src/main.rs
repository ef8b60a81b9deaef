use app_config::Config;
use tracing_subscriber::{filter::LevelFilter, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    init_log();

    let config = Config::global();

    app_logger::debug!(config = ?*config, "Running with config");

    let cli_config = config.cli();

    if cli_config.urls.is_empty() {
        app_logger::error!("No URLs provided");
        std::process::exit(1);
    }

    let results = {
        let futs = cli_config
            .urls
            .iter()
            .map(|url| async move { (url, app_scrapers::extract(url).await) });

        futures::future::join_all(futs).await
    };

    let mut failures = 0_usize;

    for (url, result) in results {
        match result {
            Ok(result) => {
                let out = if cli_config.compact {
                    serde_json::to_string(&result)
                } else {
                    serde_json::to_string_pretty(&result)
                };

                match out {
                    Ok(out) => println!("{out}"),
                    Err(e) => {
                        app_logger::error!("Failed to serialize result for {url}: {e}");
                        failures += 1;
                    }
                }
            }
            Err(e) => {
                app_logger::error!("Failed to extract {url}: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
}

fn init_log() {
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_env_filter(
            tracing_subscriber::filter::Builder::default()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("SCRAPER_HUB_LOG_LEVEL")
                .from_env_lossy(),
        )
        .finish()
        .init();
}
