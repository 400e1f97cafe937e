//! Remote library server interface
//!
//! The daemon consumes the library server over HTTP JSON: search, playlist
//! listing and resolution, metadata, library rescans, and audio streaming
//! for prefetch. All calls run inside dispatcher slots; nothing here is ever
//! awaited on the decision loop.

pub mod client;
pub mod types;

pub use client::RemoteClient;
pub use types::{RemoteMetadata, ScanSummary, SearchHit};
