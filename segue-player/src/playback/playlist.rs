//! Playlist state: ordered tracks, current position, played history
//!
//! Owned exclusively by the decision loop; no interior locking. Navigation
//! clamps rather than wraps: `previous` at the first track restarts it, and
//! `next` past the end is an error.

use crate::error::{Error, Result};
use segue_common::Track;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Ordered playlist with a current position
#[derive(Debug, Default)]
pub struct PlaylistState {
    tracks: Vec<Track>,
    current_index: Option<usize>,
    played: HashSet<usize>,
}

impl PlaylistState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole playlist. Clears position and history.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        debug!("playlist replaced: {} tracks", tracks.len());
        self.tracks = tracks;
        self.current_index = None;
        self.played.clear();
    }

    /// Append tracks, keeping position and history
    pub fn enqueue(&mut self, mut tracks: Vec<Track>) {
        debug!("enqueued {} tracks", tracks.len());
        self.tracks.append(&mut tracks);
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = None;
        self.played.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// The track at the current position
    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        match self.current_index {
            Some(i) => self.tracks.get_mut(i),
            None => None,
        }
    }

    /// Peek at the track after the current one, if any
    pub fn next_track(&self) -> Option<&Track> {
        let i = self.current_index?;
        self.tracks.get(i + 1)
    }

    pub fn next_track_mut(&mut self) -> Option<&mut Track> {
        match self.current_index {
            Some(i) => self.tracks.get_mut(i + 1),
            None => None,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Find a track by id anywhere in the playlist
    pub fn find(&mut self, id: Uuid) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Set the current position directly
    pub fn jump_to(&mut self, index: usize) -> Result<&Track> {
        if index >= self.tracks.len() {
            return Err(Error::TrackIndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        self.current_index = Some(index);
        Ok(&self.tracks[index])
    }

    /// Advance the current position by one, marking the old one played.
    ///
    /// Used by the transition commit path and the hard-advance path.
    pub fn advance(&mut self) -> Result<&Track> {
        let current = self.current_index.ok_or(Error::TrackIndexOutOfRange {
            index: 0,
            len: self.tracks.len(),
        })?;
        self.played.insert(current);
        let next = current + 1;
        if next >= self.tracks.len() {
            return Err(Error::TrackIndexOutOfRange {
                index: next,
                len: self.tracks.len(),
            });
        }
        self.current_index = Some(next);
        Ok(&self.tracks[next])
    }

    /// Index for a `previous` command: one back, clamped at the start
    pub fn previous_index(&self) -> Option<usize> {
        self.current_index.map(|i| i.saturating_sub(1))
    }

    /// Index for a `next` command
    pub fn next_index(&self) -> Option<usize> {
        let i = self.current_index?;
        if i + 1 < self.tracks.len() {
            Some(i + 1)
        } else {
            None
        }
    }

    pub fn mark_played(&mut self, index: usize) {
        self.played.insert(index);
    }

    pub fn was_played(&self, index: usize) -> bool {
        self.played.contains(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test track with a deterministic id
    fn create_test_track(id: u8) -> Track {
        let mut track = Track::local(format!("/music/{:02}.mp3", id));
        track.id = Uuid::from_bytes([id; 16]);
        track
    }

    fn playlist_of(n: u8) -> PlaylistState {
        let mut playlist = PlaylistState::new();
        playlist.replace((0..n).map(create_test_track).collect());
        playlist
    }

    #[test]
    fn test_empty_playlist() {
        let playlist = PlaylistState::new();
        assert!(playlist.is_empty());
        assert!(playlist.current().is_none());
        assert!(playlist.next_track().is_none());
    }

    #[test]
    fn test_jump_and_current() {
        let mut playlist = playlist_of(3);
        assert!(playlist.current().is_none());

        playlist.jump_to(1).unwrap();
        assert_eq!(playlist.current_index(), Some(1));
        assert_eq!(playlist.current().unwrap().id, Uuid::from_bytes([1; 16]));
        assert_eq!(playlist.next_track().unwrap().id, Uuid::from_bytes([2; 16]));
    }

    #[test]
    fn test_jump_out_of_range() {
        let mut playlist = playlist_of(2);
        let err = playlist.jump_to(5).unwrap_err();
        match err {
            Error::TrackIndexOutOfRange { index: 5, len: 2 } => {}
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(playlist.current().is_none());
    }

    #[test]
    fn test_advance_marks_played() {
        let mut playlist = playlist_of(3);
        playlist.jump_to(0).unwrap();

        let next = playlist.advance().unwrap();
        assert_eq!(next.id, Uuid::from_bytes([1; 16]));
        assert!(playlist.was_played(0));
        assert!(!playlist.was_played(1));
    }

    #[test]
    fn test_advance_past_end_fails() {
        let mut playlist = playlist_of(2);
        playlist.jump_to(1).unwrap();
        assert!(playlist.advance().is_err());
        // Position stays on the last track
        assert_eq!(playlist.current_index(), Some(1));
    }

    #[test]
    fn test_previous_clamps_at_start() {
        let mut playlist = playlist_of(3);
        playlist.jump_to(0).unwrap();
        assert_eq!(playlist.previous_index(), Some(0));

        playlist.jump_to(2).unwrap();
        assert_eq!(playlist.previous_index(), Some(1));
    }

    #[test]
    fn test_next_index_none_at_end() {
        let mut playlist = playlist_of(2);
        playlist.jump_to(1).unwrap();
        assert_eq!(playlist.next_index(), None);
    }

    #[test]
    fn test_replace_clears_history() {
        let mut playlist = playlist_of(3);
        playlist.jump_to(0).unwrap();
        playlist.advance().unwrap();
        assert!(playlist.was_played(0));

        playlist.replace(vec![create_test_track(9)]);
        assert!(!playlist.was_played(0));
        assert!(playlist.current().is_none());
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn test_enqueue_keeps_position() {
        let mut playlist = playlist_of(2);
        playlist.jump_to(1).unwrap();
        assert_eq!(playlist.next_index(), None);

        playlist.enqueue(vec![create_test_track(7)]);
        assert_eq!(playlist.current_index(), Some(1));
        assert_eq!(playlist.next_index(), Some(2));
        assert_eq!(playlist.next_track().unwrap().id, Uuid::from_bytes([7; 16]));
    }
}
