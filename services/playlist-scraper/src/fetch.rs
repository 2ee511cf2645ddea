//!
//! src/fetch.rs
//!
//! Defines methods for hitting the spotify and chosic endpoints and
//! classifying their responses. No retries: a failed lookup is
//! recorded as an omission and picked up again on the next run.
//!

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header, redirect, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ChosicConfig, HttpConfig, SpotifyConfig};
use crate::playlist::PlaylistPage;
use crate::profile::RequestHeaders;
use crate::types::TrackMetadata;
use crate::ScraperError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder  {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, ScraperError> {
    client_helper(http)
        .default_headers(headers)
        .build()
        .map_err(|e| ScraperError::Http(format!("build client: {e}")))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, ScraperError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_with_headers(http, h)
}

fn join(base: &Url, path: &str) -> Result<Url, ScraperError> {
    base.join(path)
        .map_err(|e| ScraperError::Parse(format!("url {base} + {path}: {e}")))
}

#[derive(Clone, Debug)]
pub struct SpotifyClient {
    pub http: Client,
    pub cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) ->
        Result<Self, ScraperError> {

        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone()
        })
    }

    /// POST {token_url} grant_type=client_credentials
    pub fn token_request(&self) -> RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
    }

    /// GET /v1/playlists/{id}/tracks?offset=&limit=
    pub fn playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
        bearer: &str
    ) -> Result<RequestBuilder, ScraperError> {
        let url = join(&self.cfg.api_base, &format!("playlists/{playlist_id}/tracks"))?;
        Ok(self.http.get(url).bearer_auth(bearer).query(&[
            ("offset", offset.to_string()),
            ("limit", limit.to_string())
        ]))
    }

    /// Exchanges the client id/secret pair for a bearer token
    pub async fn acquire_token(&self) -> Result<String, ScraperError> {
        let response = self.token_request().send().await?;
        let status = response.status();
        let body = response.text().await?;
        let token: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        match token["access_token"].as_str() {
            Some(bearer) if !bearer.is_empty() => {
                debug!(status = %status, "token.acquired");
                Ok(bearer.to_string())
            }
            _ => Err(ScraperError::Auth(
                format!("token response ({status}) has no access_token")
            ))
        }
    }

    pub async fn playlist_page(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
        bearer: &str
    ) -> Result<PlaylistPage, ScraperError> {
        let response = self.playlist_tracks(playlist_id, offset, limit, bearer)?
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ScraperError::Auth(
                format!("playlist {playlist_id} rejected bearer ({status})")
            ));
        }
        if !status.is_success() {
            return Err(ScraperError::Http(
                format!("playlist {playlist_id} offset {offset}: status {status}")
            ));
        }
        Ok(response.json::<PlaylistPage>().await?)
    }
}

/// The two chosic lookups made per track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    TrackInfo,
    AudioFeatures
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::TrackInfo     => "track_info",
            Endpoint::AudioFeatures => "audio_features"
        }
    }

    fn path(self, track_id: &str) -> String {
        match self {
            Endpoint::TrackInfo     => format!("tracks/{track_id}"),
            Endpoint::AudioFeatures => format!("audio-features/{track_id}")
        }
    }
}

/// Where the incremental store gets metadata for a track from
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Per-track failures come back as an empty or partial result. The only
    /// error is one that would repeat for every later track.
    async fn fetch_metadata(&self, track_id: &str) -> Result<TrackMetadata, ScraperError>;
}

const BODY_EXCERPT_CHARS: usize = 200;

fn body_excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string()
    }
}

#[derive(Clone)]
pub struct ChosicClient {
    pub http: Client,
    pub base: Url,
    nonce: String,
    headers: Arc<dyn RequestHeaders>
}

impl ChosicClient {
    pub fn new(http_config: &HttpConfig, cfg: &ChosicConfig) -> Result<Self, ScraperError> {
        Self::with_headers(http_config, cfg, Arc::new(cfg.profile.clone()))
    }

    pub fn with_headers(
        http_config: &HttpConfig,
        cfg: &ChosicConfig,
        headers: Arc<dyn RequestHeaders>
    ) -> Result<Self, ScraperError> {
        // browser headers are set per request by the profile
        let http = client_with_headers(http_config, header::HeaderMap::new())?;
        Ok( Self {
            http,
            base: cfg.base_url.clone(),
            nonce: cfg.nonce.clone(),
            headers
        })
    }

    /// GET {base}/tracks/{id} or {base}/audio-features/{id}
    pub fn request(&self, endpoint: Endpoint, track_id: &str) ->
        Result<RequestBuilder, ScraperError> {
        let url = join(&self.base, &endpoint.path(track_id))?;
        let headers = self.headers.headers(track_id, &self.nonce)?;
        Ok(self.http.get(url).headers(headers))
    }

    /// Ok(None) for any non-success status other than an expired nonce.
    /// Transport failures are `Http`, a 200 body that is not json is `Parse`.
    pub async fn fetch_endpoint(&self, endpoint: Endpoint, track_id: &str) ->
        Result<Option<Value>, ScraperError> {
        let response = self.request(endpoint, track_id)?.send().await?;
        let status = response.status();
        debug!(track = %track_id, endpoint = endpoint.as_str(), status = %status, "fetch.status");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // the body tells an expired nonce apart from a bot challenge
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::AuthExpired(format!(
                "{} for {track_id} returned {status}: {}",
                endpoint.as_str(), body_excerpt(&body)
            )));
        }
        if status != StatusCode::OK {
            return Ok(None);
        }

        let body = response.text().await?;
        let value = serde_json::from_str::<Value>(&body).map_err(|e| ScraperError::Parse(
            format!("{} for {track_id}: {e}: {}", endpoint.as_str(), body_excerpt(&body))
        ))?;
        Ok(Some(value))
    }
}

#[async_trait]
impl MetadataSource for ChosicClient {
    async fn fetch_metadata(&self, track_id: &str) -> Result<TrackMetadata, ScraperError> {
        let mut result = TrackMetadata::default();

        for endpoint in [Endpoint::TrackInfo, Endpoint::AudioFeatures] {
            match self.fetch_endpoint(endpoint, track_id).await {
                Ok(Some(body)) => match endpoint {
                    Endpoint::TrackInfo     => result.track_info = Some(body),
                    Endpoint::AudioFeatures => result.audio_features = Some(body)
                },
                Ok(None) => {}
                Err(e) if e.is_auth_expired() => return Err(e),
                Err(e @ ScraperError::Parse(_)) => {
                    warn!(track = %track_id, endpoint = endpoint.as_str(), error = %e,
                        "fetch.undecodable");
                }
                Err(e) => {
                    warn!(track = %track_id, endpoint = endpoint.as_str(), error = %e,
                        "fetch.error");
                    return Ok(TrackMetadata::default());
                }
            }
        }
        Ok(result)
    }
}
