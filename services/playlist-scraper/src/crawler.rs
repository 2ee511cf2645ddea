//!
//! src/crawler.rs
//!
//! Wires token, playlist walk, chosic lookups and the incremental
//! store together. Everything runs sequentially, one track at a time.
//!
//!

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AppConfig, PlaylistRun, RunMode, TrackRun, TrackSource};
use crate::embed::extract_track_id;
use crate::errors::ScraperError;
use crate::fetch::{ChosicClient, Endpoint, SpotifyClient};
use crate::persistent::{Dataset, sync_tracks};
use crate::playlist::enumerate_tracks;
use crate::sink::JsonFileSink;
use crate::types::{SingleTrackRecord, SpotifyTrackId};

/// Keeps at least `min_interval` between the end of one lookup and the
/// start of the next
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_done: Option<Instant>
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_done: None }
    }

    pub async fn wait(&self) {
        if let Some(last) = self.last_done {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
    }

    /// Marks the end of a lookup; the next `wait` counts from here
    pub fn done(&mut self) {
        self.last_done = Some(Instant::now());
    }
}

pub struct Scraper {
    spotify: Option<SpotifyClient>,
    chosic: ChosicClient,

    // stops a playlist run between tracks
    shutdown: CancellationToken
}

impl Scraper {
    pub fn new(cfg: &AppConfig) -> Result<Self, ScraperError> {
        let spotify = cfg.spotify.as_ref()
            .map(|spotify| SpotifyClient::new(&cfg.http, spotify))
            .transpose()?;
        let chosic = ChosicClient::new(&cfg.http, &cfg.chosic)?;
        Ok(Self::from_clients(spotify, chosic))
    }

    pub fn from_clients(spotify: Option<SpotifyClient>, chosic: ChosicClient) -> Self {
        Self { spotify, chosic, shutdown: CancellationToken::new() }
    }

    pub fn shutdown(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&self, mode: &RunMode) -> Result<(), ScraperError> {
        match mode {
            RunMode::Playlist(run) => self.run_playlist(run).await,
            RunMode::Track(run)    => self.run_track(run).await
        }
    }

    async fn run_playlist(&self, run: &PlaylistRun) -> Result<(), ScraperError> {
        let spotify = self.spotify.as_ref().ok_or_else(|| ScraperError::Config(
            "playlist mode needs SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET".to_string()
        ))?;
        info!(playlist = %run.playlist_id, max_tracks = ?run.max_tracks, "scraper.start");

        let bearer = spotify.acquire_token().await?;
        info!("token.acquired");

        let tracks = enumerate_tracks(spotify, &run.playlist_id, &bearer, run.max_tracks)
            .await?;

        let mut dataset = Dataset::load(&run.output);
        let before = dataset.len();
        let mut gate = RateGate::new(run.delay);
        let outcome = sync_tracks(
            &mut dataset, &self.chosic, &tracks, &mut gate, &self.shutdown
        ).await;

        // records fetched before an expired nonce are still valid
        let sink = JsonFileSink::new(&run.output);
        dataset.save(&sink)?;

        let summary = outcome.inspect_err(|e| {
            warn!(error = %e, saved = dataset.len(), "scraper.aborted");
        })?;
        info!(
            tracks = tracks.len(),
            before,
            after = dataset.len(),
            appended = summary.appended,
            skipped = summary.skipped,
            empty = summary.empty,
            "scraper.done"
        );

        if summary.interrupted {
            println!("Interrupted. Partial data saved to '{}'", sink.path().display());
        } else {
            println!("Done. Data saved to '{}'", sink.path().display());
        }
        Ok(())
    }

    async fn run_track(&self, run: &TrackRun) -> Result<(), ScraperError> {
        let track_id = match &run.source {
            TrackSource::Id(id)         => id.clone(),
            TrackSource::Html(html)     => extract_track_id(html)?,
            TrackSource::HtmlFile(path) => extract_track_id(&std::fs::read_to_string(path)?)?
        };
        println!("Track ID: {track_id}");

        let audio_features = self.required(Endpoint::AudioFeatures, &track_id).await?;
        let track_info = self.required(Endpoint::TrackInfo, &track_id).await?;

        let sink = JsonFileSink::new(&run.output);
        sink.write(&SingleTrackRecord { track_id, track_info, audio_features })?;
        println!("Saved track metadata to '{}'", sink.path().display());
        Ok(())
    }

    /// Single track mode has nothing to fall back on, so a miss is an error
    async fn required(&self, endpoint: Endpoint, track_id: &SpotifyTrackId) ->
        Result<serde_json::Value, ScraperError> {
        self.chosic.fetch_endpoint(endpoint, track_id.as_str())
            .await?
            .ok_or_else(|| ScraperError::NotFound(
                format!("{} for {track_id}", endpoint.as_str())
            ))
    }
}
