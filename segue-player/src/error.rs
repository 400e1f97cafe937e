//! Error types for the playback daemon

use thiserror::Error;

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a background task, delivered on the dispatcher channel
///
/// Task failures never tear down the slot or the engine; the controller
/// logs them and emits a TaskFailed event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The operation ran past its per-submit deadline
    #[error("task timed out")]
    Timeout,

    /// The remote server answered with an error or malformed payload
    #[error("remote failure: {0}")]
    Remote(String),

    /// The operation's target could not be reached or read
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Playback daemon error type
#[derive(Error, Debug)]
pub enum Error {
    /// A track's source could not be opened or started.
    /// Aborts the affected operation only; playback elsewhere continues.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A transition is already in flight; the request was rejected
    /// without any state change.
    #[error("Transition busy")]
    TransitionBusy,

    /// Playlist index outside the current playlist
    #[error("Track index {index} out of range (playlist has {len} tracks)")]
    TrackIndexOutOfRange { index: usize, len: usize },

    /// An operation that needs a loaded track found none
    #[error("Nothing is playing")]
    NothingPlaying,

    /// A background task failed
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// HTTP surface or client error
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The decision loop is gone; the daemon is shutting down
    #[error("Player unavailable: {0}")]
    PlayerGone(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<segue_common::Error> for Error {
    fn from(err: segue_common::Error) -> Self {
        match err {
            segue_common::Error::Io(e) => Error::Io(e),
            segue_common::Error::Config(msg) => Error::Config(msg),
            segue_common::Error::NotFound(msg) => Error::SourceUnavailable(msg),
            segue_common::Error::InvalidInput(msg) => Error::Config(msg),
            segue_common::Error::Internal(msg) => Error::Internal(msg),
        }
    }
}
