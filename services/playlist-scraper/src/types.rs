use serde::{Deserialize, Serialize};
use serde_json::Value;

// Opaque alphanumeric id assigned by spotify
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpotifyTrackId(pub String);

impl SpotifyTrackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpotifyTrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Track descriptor produced while walking a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: String,
    pub name: String,
    pub artist: String
}

/// Merged bodies of the two chosic endpoints. Either key may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_features: Option<Value>
}

impl TrackMetadata {
    pub fn is_empty(&self) -> bool {
        self.track_info.is_none() && self.audio_features.is_none()
    }
}

/// One element of the persisted playlist dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(flatten)]
    pub metadata: TrackMetadata,
    pub spotify: TrackRef
}

/// Output document of single-track mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTrackRecord {
    pub track_id: SpotifyTrackId,
    pub track_info: Value,
    pub audio_features: Value
}
