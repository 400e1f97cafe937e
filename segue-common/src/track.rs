//! Track model shared by the engine and the control surface
//!
//! A track's origin is a single tagged `TrackSource`. Every call site matches
//! it exhaustively; there is no parallel boolean or string classification.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where a track's audio comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackSource {
    /// File on the local filesystem
    Local {
        /// Absolute path to the audio file
        path: PathBuf,
    },
    /// File served by the remote library server
    Remote {
        /// Server base URL, e.g. `http://192.168.1.10:5000`
        base_url: String,
        /// Library-relative file path as the server knows it
        path: String,
    },
}

impl TrackSource {
    /// Streaming URL for a remote source (`{base}/serve_audio/{path}`).
    ///
    /// Returns None for local sources.
    pub fn stream_url(&self) -> Option<String> {
        match self {
            TrackSource::Local { .. } => None,
            TrackSource::Remote { base_url, path } => {
                Some(format!("{}/serve_audio/{}", base_url.trim_end_matches('/'), path))
            }
        }
    }

    /// Human-readable name derived from the file name
    pub fn file_name(&self) -> String {
        match self {
            TrackSource::Local { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            TrackSource::Remote { path, .. } => path
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(path)
                .to_string(),
        }
    }
}

/// Metadata as resolved by the metadata store (remote server or tags)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub codec: Option<String>,
    pub duration_secs: Option<f64>,
    pub lyrics: Option<String>,
    /// Embedded album art, base64-encoded as served by the metadata route
    pub art: Option<String>,
}

/// A playlist as listed by the remote library server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: i64,
    pub name: String,
}

/// A playable entry in the playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub source: TrackSource,
    /// Known duration in seconds, if any source has reported it yet
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrackMetadata>,
    /// Local spool copy of a remote source, filled in once prefetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<PathBuf>,
}

impl Track {
    /// Create a track for a local file
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: TrackSource::Local { path: path.into() },
            duration_secs: None,
            metadata: None,
            cached: None,
        }
    }

    /// Create a track streamed from the remote library server
    pub fn remote(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: TrackSource::Remote {
                base_url: base_url.into(),
                path: path.into(),
            },
            duration_secs: None,
            metadata: None,
            cached: None,
        }
    }

    /// Path the playback sink can open right now, if any.
    ///
    /// Local sources are always openable; remote sources only after the
    /// prefetch task has spooled them to the cache directory.
    pub fn playable_path(&self) -> Option<&Path> {
        match &self.source {
            TrackSource::Local { path } => Some(path),
            TrackSource::Remote { .. } => self.cached.as_deref(),
        }
    }

    /// Whether a start attempt on this track can succeed without network I/O
    pub fn is_start_ready(&self) -> bool {
        self.playable_path().is_some()
    }

    /// Title for logs and status displays: metadata title, else file name
    pub fn display_name(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| self.source.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_for_remote() {
        let source = TrackSource::Remote {
            base_url: "http://10.0.0.5:5000/".to_string(),
            path: "albums/one/track.flac".to_string(),
        };
        assert_eq!(
            source.stream_url().unwrap(),
            "http://10.0.0.5:5000/serve_audio/albums/one/track.flac"
        );
    }

    #[test]
    fn test_stream_url_none_for_local() {
        let source = TrackSource::Local {
            path: PathBuf::from("/music/track.flac"),
        };
        assert!(source.stream_url().is_none());
    }

    #[test]
    fn test_local_track_is_start_ready() {
        let track = Track::local("/music/a.mp3");
        assert!(track.is_start_ready());
        assert_eq!(track.playable_path().unwrap(), Path::new("/music/a.mp3"));
    }

    #[test]
    fn test_remote_track_ready_only_after_prefetch() {
        let mut track = Track::remote("http://srv:5000", "x/y.mp3");
        assert!(!track.is_start_ready());

        track.cached = Some(PathBuf::from("/tmp/spool/y.mp3"));
        assert!(track.is_start_ready());
        assert_eq!(track.playable_path().unwrap(), Path::new("/tmp/spool/y.mp3"));
    }

    #[test]
    fn test_display_name_prefers_metadata_title() {
        let mut track = Track::local("/music/04 - song.mp3");
        assert_eq!(track.display_name(), "04 - song.mp3");

        track.metadata = Some(TrackMetadata {
            title: Some("Song".to_string()),
            ..Default::default()
        });
        assert_eq!(track.display_name(), "Song");
    }
}
