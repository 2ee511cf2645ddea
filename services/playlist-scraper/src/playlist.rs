//!
//! src/playlist.rs
//!
//! Walks the pages of a spotify playlist and flattens them into
//! track descriptors, preserving playlist order
//!

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::PLAYLIST_PAGE_LIMIT;
use crate::errors::ScraperError;
use crate::fetch::SpotifyClient;
use crate::types::TrackRef;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub next: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<PlaylistTrack>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Option<Vec<ArtistRef>>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub name: Option<String>
}

impl PlaylistTrack {
    /// None for local files and removed tracks, which carry no id
    pub fn to_track_ref(&self) -> Option<TrackRef> {
        let id = self.id.as_deref().filter(|id| !id.is_empty())?;
        let artist = self.artists.as_ref()
            .and_then(|artists| artists.first())
            .and_then(|a| a.name.clone())
            .unwrap_or_default();

        Some(TrackRef {
            id: id.to_string(),
            name: self.name.clone().unwrap_or_default(),
            artist
        })
    }
}

impl PlaylistPage {
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }

    pub fn track_refs(&self) -> impl Iterator<Item = TrackRef> + '_ {
        self.items.iter()
            .filter_map(|item| item.track.as_ref())
            .filter_map(PlaylistTrack::to_track_ref)
    }
}

/// Requests pages at offsets 0, 100, 200, ... until the playlist has no
/// next page or `max_tracks` descriptors were collected
pub async fn enumerate_tracks(
    client: &SpotifyClient,
    playlist_id: &str,
    bearer: &str,
    max_tracks: Option<usize>
) -> Result<Vec<TrackRef>, ScraperError> {
    let cap = max_tracks.unwrap_or(usize::MAX);
    let mut tracks = Vec::new();
    let mut offset = 0_u32;

    while tracks.len() < cap {
        let page = client.playlist_page(playlist_id, offset, PLAYLIST_PAGE_LIMIT, bearer)
            .await?;
        debug!(offset, items = page.items.len(), next = page.has_next(), "playlist.page");

        for track in page.track_refs() {
            tracks.push(track);
            if tracks.len() >= cap {
                break;
            }
        }

        if !page.has_next() {
            break;
        }
        offset += PLAYLIST_PAGE_LIMIT;
    }

    info!(playlist = %playlist_id, tracks = tracks.len(), "playlist.done");
    Ok(tracks)
}
