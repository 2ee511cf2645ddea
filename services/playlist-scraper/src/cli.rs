use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_PLAYLIST_OUTPUT, DEFAULT_TRACK_OUTPUT, FETCH_DELAY_MS,
    PlaylistRun, RunMode, TrackRun, TrackSource
};
use crate::errors::ScraperError;
use crate::types::SpotifyTrackId;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "playlist-scraper",
    version,
    about = "Collects chosic track info and audio features for spotify tracks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch metadata for every track of a playlist, skipping tracks already saved
    Playlist(PlaylistArgs),

    /// Fetch metadata for a single track
    Track(TrackArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PlaylistArgs {
    /// Spotify playlist id
    #[arg(long, env = "SPOTIFY_PLAYLIST_ID")]
    pub playlist_id: String,

    /// Dataset file, read and rewritten on every run
    #[arg(short, long, default_value = DEFAULT_PLAYLIST_OUTPUT)]
    pub output: PathBuf,

    /// Stop after this many tracks
    #[arg(long)]
    pub max_tracks: Option<usize>,

    /// Milliseconds between chosic lookups
    #[arg(long, default_value_t = FETCH_DELAY_MS)]
    pub delay_ms: u64,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TrackSourceArgs {
    /// Spotify track id
    #[arg(long)]
    pub track_id: Option<String>,

    /// Embed snippet containing the track
    #[arg(long)]
    pub html: Option<String>,

    /// File holding an embed snippet
    #[arg(long, value_name = "FILE")]
    pub html_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    #[command(flatten)]
    pub source: TrackSourceArgs,

    #[arg(short, long, default_value = DEFAULT_TRACK_OUTPUT)]
    pub output: PathBuf,
}

impl TrackSourceArgs {
    fn into_source(self) -> Result<TrackSource, ScraperError> {
        match (self.track_id, self.html, self.html_file) {
            (Some(id), _, _) => {
                if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(ScraperError::Config(format!("invalid track id {id:?}")));
                }
                Ok(TrackSource::Id(SpotifyTrackId(id)))
            }
            (_, Some(html), _) => Ok(TrackSource::Html(html)),
            (_, _, Some(path)) => Ok(TrackSource::HtmlFile(path)),
            _ => Err(ScraperError::Config(
                "one of --track-id, --html or --html-file is required".to_string()
            ))
        }
    }
}

impl Cli {
    pub fn run_mode(self) -> Result<RunMode, ScraperError> {
        match self.command {
            Command::Playlist(args) => {
                if args.playlist_id.trim().is_empty() {
                    return Err(ScraperError::Config("playlist id is empty".to_string()));
                }
                Ok(RunMode::Playlist(PlaylistRun {
                    playlist_id: args.playlist_id.trim().to_string(),
                    output: args.output,
                    max_tracks: args.max_tracks,
                    delay: Duration::from_millis(args.delay_ms)
                }))
            }
            Command::Track(args) => Ok(RunMode::Track(TrackRun {
                source: args.source.into_source()?,
                output: args.output
            }))
        }
    }
}
