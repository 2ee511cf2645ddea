//!
//! src/main.rs
//!
//! Entry point of the playlist scraper: parses the run configuration,
//! loads credentials from the environment and hands off to the scraper
//!
//!

mod cli;
mod config;
mod errors;
mod logging;

mod crawler;
mod embed;
mod fetch;
mod persistent;
mod playlist;
mod profile;
mod sink;
mod types;

use clap::Parser;
use tracing::{error, warn};

use crate::errors::ScraperError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ScraperError> {
    // .env may carry SPOTIFY_PLAYLIST_ID for the cli
    dotenvy::dotenv().ok();

    let mode = cli::Cli::parse().run_mode()?;
    let cfgs = config::load_config(&mode)?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "playlist-scraper",
        version = %env!("CARGO_PKG_VERSION"),
        header_profile = %cfgs.chosic.profile.version,
        "starting"
    );

    let scraper = crawler::Scraper::new(&cfgs)?;

    let shutdown = scraper.shutdown();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(msg = "finishing current track then saving", "scraper.signal");
            shutdown.cancel();
        }
    });

    if let Err(e) = scraper.run(&mode).await {
        error!(error = %e, "scraper.failed");
        return Err(e);
    }
    Ok(())
}
