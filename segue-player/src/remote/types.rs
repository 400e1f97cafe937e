//! Wire types for the remote library server

use segue_common::{Track, TrackMetadata};
use serde::{Deserialize, Serialize};

/// One row of a search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Library-relative path the server serves audio under
    pub path: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl SearchHit {
    /// Build a playable remote track, carrying the hit's tags as metadata
    pub fn into_track(self, base_url: &str) -> Track {
        let mut track = Track::remote(base_url, self.path);
        track.metadata = Some(TrackMetadata {
            artist: clean(self.artist),
            title: clean(self.title),
            album: clean(self.album),
            ..Default::default()
        });
        track
    }
}

/// Metadata as the server's metadata route returns it
///
/// String fields arrive as empty strings rather than null when untagged;
/// `into_metadata` normalizes those away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMetadata {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    /// Base64-encoded album art
    #[serde(default)]
    pub picture: Option<String>,
}

impl RemoteMetadata {
    pub fn into_metadata(self) -> TrackMetadata {
        TrackMetadata {
            artist: clean(self.artist),
            title: clean(self.title),
            album: clean(self.album),
            year: clean(self.year),
            codec: clean(self.codec),
            duration_secs: self.duration.filter(|d| *d > 0.0),
            lyrics: clean(self.lyrics),
            art: clean(self.picture),
        }
    }
}

/// Result of a remote library rescan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub success: bool,
    pub message: String,
}

/// Playlist resolution envelope (`/load_playlist/{id}`)
#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub playlist: Vec<String>,
    #[serde(default)]
    pub name: String,
}

/// Scan response as it comes off the wire (`error` xor `success`)
#[derive(Debug, Deserialize)]
pub(crate) struct ScanEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
