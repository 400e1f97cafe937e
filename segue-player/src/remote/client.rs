//! HTTP client for the remote library server

use crate::error::{Error, Result, TaskError};
use crate::remote::types::{PlaylistEnvelope, RemoteMetadata, ScanEnvelope, ScanSummary, SearchHit};
use segue_common::track::PlaylistSummary;
use segue_common::{Track, TrackMetadata, TrackSource};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("segue-player/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Liveness probes answer fast or not at all
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
/// Full-file downloads get a longer budget than JSON calls
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the library server's JSON API
///
/// Cheap to clone; every operation borrows `&self`, so workers get their own
/// clone and run without coordination.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("client setup: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> std::result::Result<T, TaskError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TaskError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::Remote(format!("{} -> {}: {}", url, status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| TaskError::Remote(format!("parse: {}", e)))
    }

    /// Search the library. Public column names are title, artist, album,
    /// filename; they map onto the server's schema here.
    pub async fn search(
        &self,
        column: &str,
        query: &str,
    ) -> std::result::Result<Vec<SearchHit>, TaskError> {
        let db_column = match column {
            "title" => "song_title",
            "filename" => "file_name",
            other => other,
        };
        let url = format!(
            "{}?column={}&query={}",
            self.url("search_songs"),
            db_column,
            urlencode(query)
        );
        let hits: Vec<SearchHit> = self.get_json(url).await?;
        info!("search {}={} returned {} hits", column, query, hits.len());
        Ok(hits)
    }

    /// List the playlists the server knows about
    pub async fn playlists(&self) -> std::result::Result<Vec<PlaylistSummary>, TaskError> {
        self.get_json(self.url("get_playlists")).await
    }

    /// Resolve a playlist into an ordered list of remote tracks
    pub async fn playlist_tracks(
        &self,
        playlist_id: i64,
    ) -> std::result::Result<(String, Vec<Track>), TaskError> {
        let envelope: PlaylistEnvelope = self
            .get_json(self.url(&format!("load_playlist/{}", playlist_id)))
            .await?;
        if !envelope.success {
            return Err(TaskError::Remote(format!(
                "playlist {} not resolvable",
                playlist_id
            )));
        }
        let tracks = envelope
            .playlist
            .into_iter()
            .map(|path| Track::remote(&self.base_url, path))
            .collect::<Vec<_>>();
        info!(
            "playlist '{}' resolved to {} tracks",
            envelope.name,
            tracks.len()
        );
        Ok((envelope.name, tracks))
    }

    /// Metadata for one library file
    pub async fn metadata(&self, path: &str) -> std::result::Result<TrackMetadata, TaskError> {
        let raw: RemoteMetadata = self
            .get_json(self.url(&format!("get_song_metadata/{}", path)))
            .await?;
        Ok(raw.into_metadata())
    }

    /// Ask the server to rescan its library folder
    pub async fn scan_library(
        &self,
        folder_path: Option<&str>,
    ) -> std::result::Result<ScanSummary, TaskError> {
        let url = self.url("scan_library");
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "folder_path": folder_path }))
            .send()
            .await
            .map_err(|e| TaskError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::Remote(format!("{} -> {}: {}", url, status, body)));
        }

        let envelope: ScanEnvelope = response
            .json()
            .await
            .map_err(|e| TaskError::Remote(format!("parse: {}", e)))?;
        if let Some(error) = envelope.error {
            return Err(TaskError::Remote(error));
        }
        Ok(ScanSummary {
            success: envelope.success,
            message: envelope.message.unwrap_or_default(),
        })
    }

    /// Liveness probe against the server root. Infallible by design; any
    /// failure just reads as unreachable.
    pub async fn probe(&self) -> bool {
        let request = self.http.get(&self.base_url).timeout(PROBE_TIMEOUT);
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Download a remote track to the spool directory for local playback.
    ///
    /// Returns the spool file path to record on the track.
    pub async fn prefetch(
        &self,
        track: &Track,
        spool_dir: &Path,
    ) -> std::result::Result<PathBuf, TaskError> {
        let TrackSource::Remote { .. } = &track.source else {
            return Err(TaskError::Unavailable(
                "prefetch only applies to remote tracks".to_string(),
            ));
        };
        let url = match track.source.stream_url() {
            Some(url) => url,
            None => {
                return Err(TaskError::Unavailable(
                    "remote track has no stream URL".to_string(),
                ))
            }
        };

        debug!("prefetching {}", url);
        let response = self
            .http
            .get(&url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| TaskError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TaskError::Remote(format!("{} -> {}", url, status)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TaskError::Remote(e.to_string()))?;

        tokio::fs::create_dir_all(spool_dir)
            .await
            .map_err(|e| TaskError::Unavailable(format!("spool dir: {}", e)))?;
        let dest = spool_dir.join(format!(
            "{}-{}",
            track.id.simple(),
            track.source.file_name()
        ));
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| TaskError::Unavailable(format!("spool write: {}", e)))?;

        info!(
            "prefetched {} ({} bytes) to {}",
            track.display_name(),
            bytes.len(),
            dest.display()
        );
        Ok(dest)
    }
}

/// Minimal query-string escaping for the characters that break URLs
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            ' ' => out.push_str("%20"),
            '&' => out.push_str("%26"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '%' => out.push_str("%25"),
            '+' => out.push_str("%2B"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = RemoteClient::new("http://srv:5000/").unwrap();
        assert_eq!(client.base_url(), "http://srv:5000");
        assert_eq!(client.url("get_playlists"), "http://srv:5000/get_playlists");
    }

    #[test]
    fn test_urlencode_query() {
        assert_eq!(urlencode("hello world"), "hello%20world");
        assert_eq!(urlencode("a&b#c"), "a%26b%23c");
        assert_eq!(urlencode("50%"), "50%25");
        assert_eq!(urlencode("plain"), "plain");
    }
}
