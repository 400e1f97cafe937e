//! Configuration loading
//!
//! Settings resolve in priority order: command-line argument (or its
//! environment variable, handled by clap), then the TOML config file,
//! then compiled defaults. A missing config file is not an error; a
//! file named explicitly with `--config` must exist.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use segue_common::EngineParams;

use crate::error::{Error, Result};

/// Default HTTP port for the playback daemon
pub const DEFAULT_PORT: u16 = 5720;

/// Values the daemon actually runs with
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP API listens on
    pub port: u16,
    /// Base URL of the remote library server, if one is configured
    pub server_url: Option<String>,
    /// Directory remote tracks are spooled into before playback
    pub spool_dir: PathBuf,
    /// Transition and gap detection tuning
    pub engine: EngineParams,
}

/// Optional overrides collected from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub server_url: Option<String>,
    pub spool_dir: Option<PathBuf>,
}

/// Shape of the TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    port: Option<u16>,
    server: Option<String>,
    spool_dir: Option<PathBuf>,
    #[serde(default)]
    engine: EngineParams,
}

impl Config {
    /// Resolve the effective configuration.
    ///
    /// `config_path` is the `--config` argument; when None the platform
    /// default location is consulted and silently skipped if absent.
    pub fn resolve(overrides: Overrides, config_path: Option<&Path>) -> Result<Config> {
        let file = load_file(config_path)?;
        Ok(merge(overrides, file))
    }
}

/// Combine CLI overrides with whatever the file provided
fn merge(overrides: Overrides, file: Option<FileConfig>) -> Config {
    let file = file.unwrap_or_default();
    Config {
        port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
        server_url: overrides.server_url.or(file.server),
        spool_dir: overrides
            .spool_dir
            .or(file.spool_dir)
            .unwrap_or_else(default_spool_dir),
        engine: file.engine,
    }
}

fn load_file(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) => path,
            None => {
                debug!("no config file; using defaults");
                return Ok(None);
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("could not read {}: {}", path.display(), e)))?;
    let parsed: FileConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("could not parse {}: {}", path.display(), e)))?;
    info!(path = %path.display(), "loaded config file");
    Ok(Some(parsed))
}

/// First existing config file among the platform's candidate locations
fn default_config_path() -> Option<PathBuf> {
    let user = dirs::config_dir().map(|d| d.join("segue").join("config.toml"));
    if let Some(path) = user {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/segue/config.toml");
        if system.exists() {
            return Some(system);
        }
    }
    None
}

/// OS-dependent spool directory for prefetched remote tracks
pub fn default_spool_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("segue").join("spool"))
        .unwrap_or_else(|| std::env::temp_dir().join("segue-spool"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_nothing_is_given() {
        let config = merge(Overrides::default(), None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.server_url.is_none());
        assert_eq!(config.engine, EngineParams::default());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file = FileConfig {
            port: Some(6100),
            server: Some("http://jukebox:5000".to_string()),
            ..FileConfig::default()
        };
        let config = merge(Overrides::default(), Some(file));
        assert_eq!(config.port, 6100);
        assert_eq!(config.server_url.as_deref(), Some("http://jukebox:5000"));
    }

    #[test]
    fn test_cli_overrides_beat_the_file() {
        let file = FileConfig {
            port: Some(6100),
            server: Some("http://jukebox:5000".to_string()),
            ..FileConfig::default()
        };
        let overrides = Overrides {
            port: Some(7000),
            server_url: Some("http://other:5000".to_string()),
            spool_dir: None,
        };
        let config = merge(overrides, Some(file));
        assert_eq!(config.port, 7000);
        assert_eq!(config.server_url.as_deref(), Some("http://other:5000"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = load_file(Some(Path::new("/nonexistent/segue.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_engine_table_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 6200\n\n[engine]\ncrossfade_steps = 40\nmix_curve = \"smooth\""
        )
        .unwrap();

        let parsed = load_file(Some(file.path())).unwrap().unwrap();
        assert_eq!(parsed.port, Some(6200));
        assert_eq!(parsed.engine.crossfade_steps, 40);
        assert_eq!(
            parsed.engine.crossfade_window_seconds,
            EngineParams::default().crossfade_window_seconds
        );
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(load_file(Some(file.path())).is_err());
    }
}
