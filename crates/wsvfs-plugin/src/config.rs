//! Plugin configuration file.
//!
//! Stored at `~/.config/wsvfs/config.toml` on Linux and under the platform
//! configuration directory elsewhere. A missing file means defaults.
//!
//! # Example configuration
//!
//! ```toml
//! [plugin]
//! title = "WebShare.cz"
//!
//! [logging]
//! enabled = true
//! level = "debug"
//! directory = "/var/log/wsvfs"
//!
//! [listing]
//! probe_depth = 8
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while locating or reading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginConfig {
    pub plugin: PluginSection,
    pub logging: LoggingConfig,
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginSection {
    /// Name the host shows for the plugin root
    pub title: String,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self {
            title: "WebShare.cz".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Log directory; the platform state directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingConfig {
    /// How deep the bulk-delete probe looks for a file; unlimited when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_depth: Option<usize>,
}

impl ListingConfig {
    pub fn probe_depth(&self) -> usize {
        self.probe_depth.unwrap_or(usize::MAX)
    }
}

impl PluginConfig {
    /// Loads the configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path()?)
    }

    /// Loads the configuration from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Path of the configuration file.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let base_dirs = directories::BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
    Ok(base_dirs.config_dir().join("wsvfs").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = PluginConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, PluginConfig::default());
        assert_eq!(config.plugin.title, "WebShare.cz");
        assert_eq!(config.listing.probe_depth(), usize::MAX);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n\n[listing]\nprobe_depth = 4\n").unwrap();

        let config = PluginConfig::load_from(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.enabled);
        assert_eq!(config.listing.probe_depth(), 4);
        assert_eq!(config.plugin, PluginSection::default());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging\nlevel = ").unwrap();

        let err = PluginConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_serializes_back() {
        let config = PluginConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: PluginConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
