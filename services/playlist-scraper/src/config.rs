use std::{path::PathBuf, time};

use url::Url;

use crate::ScraperError;
use crate::profile::HeaderProfile;
use crate::types::SpotifyTrackId;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

/// Constants for a playlist run
pub const PLAYLIST_PAGE_LIMIT: u32 = 100;
pub const FETCH_DELAY_MS: u64 = 100;
pub const DEFAULT_PLAYLIST_OUTPUT: &str = "playlist_chosic_data.json";
pub const DEFAULT_TRACK_OUTPUT: &str = "track_metadata.json";

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, ScraperError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ScraperError::Config(format!("{s} was not set"))),
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

/// Parses an env provided url (or its default) and checks scheme and host
fn service_url(var: &str, default: &str, host: &str) -> Result<Url, ScraperError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    let url = Url::parse(&raw)
        .map_err(|e| ScraperError::Config(format!("{var} invalid {e}")))?;

    ensure_https(&url).map_err(ScraperError::Config)?;
    ensure_host(&url, host).map_err(ScraperError::Config)?;
    Ok(url)
}

/// Configuration that Spotify expects when hitting endpoints
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
    pub api_base: Url,
}

fn build_spotify() -> Result<SpotifyConfig, ScraperError> {
    let client_id     = env_check("SPOTIFY_CLIENT_ID")?;
    let client_secret = env_check("SPOTIFY_CLIENT_SECRET")?;

    let token_url = service_url(
        "SPOTIFY_TOKEN_URL",
        "https://accounts.spotify.com/api/token",
        "accounts.spotify.com"
    )?;
    let mut api_base = service_url(
        "SPOTIFY_API_BASE",
        "https://api.spotify.com/v1/",
        "api.spotify.com"
    )?;
    ensure_trailing_slash(&mut api_base);

    Ok( SpotifyConfig { client_id, client_secret, token_url, api_base })
}

///
/// Configuration for the chosic lookup api
///
#[derive(Debug, Clone)]
pub struct ChosicConfig {
    pub base_url: Url,          // https://www.chosic.com/api/tools/
    pub nonce: String,          // X-WP-Nonce, expires periodically
    pub profile: HeaderProfile
}

fn build_chosic() -> Result<ChosicConfig, ScraperError> {
    let nonce = env_check("CHOSIC_NONCE")?;

    let mut base_url = service_url(
        "CHOSIC_BASE_URL",
        "https://www.chosic.com/api/tools/",
        "www.chosic.com"
    )?;
    ensure_trailing_slash(&mut base_url);

    let profile = match std::env::var("CHOSIC_HEADER_PROFILE") {
        Ok(path) if !path.trim().is_empty() => HeaderProfile::from_file(path.trim())?,
        _ => HeaderProfile::default()
    };

    Ok( ChosicConfig { base_url, nonce, profile } )
}

///
/// Configuration for Http timeouts, pooling, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json"   => Some(LogFormat::Json),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,playlist_scraper=debug,reqwest=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: true,
        }
    }
}

fn build_logging() -> Result<LoggingConfig, ScraperError> {
    let mut logging = LoggingConfig::default();
    if let Ok(raw) = std::env::var("LOG_FORMAT") {
        logging.format = LogFormat::parse(&raw).ok_or_else(|| ScraperError::Config(
            format!("LOG_FORMAT must be json or pretty, got {raw}")
        ))?;
    }
    if logging.format == LogFormat::Json {
        logging.with_ansi = false;
        logging.include_file_line = true;
    }
    Ok(logging)
}

///
/// Explicit run configuration, produced by the cli
///

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRun {
    pub playlist_id: String,
    pub output: PathBuf,
    pub max_tracks: Option<usize>,   // None walks the whole playlist
    pub delay: time::Duration        // spacing between chosic lookups
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Id(SpotifyTrackId),
    Html(String),
    HtmlFile(PathBuf)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRun {
    pub source: TrackSource,
    pub output: PathBuf
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Playlist(PlaylistRun),
    Track(TrackRun)
}

///
/// AppConfig which holds everything the fetch module and scraper need
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: Option<SpotifyConfig>,   // only required in playlist mode
    pub chosic: ChosicConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
/// Expects `.env` to have been loaded already, main does so before the cli parses.
///
pub fn load_config(mode: &RunMode) -> Result<AppConfig, ScraperError> {
    let spotify = match mode {
        RunMode::Playlist(_) => Some(build_spotify()?),
        RunMode::Track(_)    => None
    };
    let chosic  = build_chosic()?;
    let http    = HttpConfig::default();
    let logging = build_logging()?;

    Ok( AppConfig { spotify, chosic, http, logging } )
}
