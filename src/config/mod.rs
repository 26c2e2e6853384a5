//! Engine configuration.
//!
//! Settings are loaded from a TOML file. Resolution order: the path in the
//! `INFORME_CONFIG` environment variable, then `./informe.toml`, then
//! `<user config dir>/informe/config.toml`, then built-in defaults. Every
//! field is optional; missing sections fall back field by field.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::{DEFAULT_KEY_PREFIX, DEFAULT_TTL_SECONDS};
use crate::export::DEFAULT_CHUNK_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

/// Cache section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Fallback TTL in seconds when neither the call nor the report declares
    /// one.
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,
    /// Key namespace prefix.
    #[serde(default = "default_prefix")]
    pub key_prefix: String,
    /// SQLite cache database path; `None` selects the platform default.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl(),
            key_prefix: default_prefix(),
            sqlite_path: None,
        }
    }
}

/// Export section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    /// Chunk size in bytes for streamed exports.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Settings {
    /// Load from an explicit file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the first config file found, or defaults when none exists.
    pub fn load() -> Result<Self, SettingsError> {
        for path in Self::candidate_paths() {
            if path.is_file() {
                return Self::from_file(path);
            }
        }
        Ok(Self::default())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(env_path) = std::env::var("INFORME_CONFIG") {
            if !env_path.trim().is_empty() {
                paths.push(PathBuf::from(env_path));
            }
        }
        paths.push(PathBuf::from("informe.toml"));
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("informe").join("config.toml"));
        }
        paths
    }
}
