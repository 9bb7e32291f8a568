//! User configuration for sumpoints
//!
//! Read from `config.json` in the config directory. Command-line flags are
//! layered on top with [`Config::apply_overrides`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geometry::Orientation;
use crate::render::{CumulativeMode, CutoutMode, DeviceClass, ViewState};
use crate::storage::FileStore;

/// Settings persisted in the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub share_url: Option<String>,
    pub vertical: bool,
    pub touch: bool,
    pub cumulative: CumulativeMode,
    pub cutout: CutoutMode,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub storage_dir: Option<PathBuf>,
    pub share_url: Option<String>,
    pub vertical: bool,
    pub touch: bool,
}

impl Config {
    /// Load from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`; a missing or malformed file gives the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from));
        match parsed {
            Ok(config) => {
                tracing::debug!(?path, "loaded config");
                config
            }
            Err(e) => {
                tracing::warn!(?path, "Ignoring unreadable config: {e}");
                Self::default()
            }
        }
    }

    /// `$XDG_CONFIG_HOME/sumpoints/config.json`, falling back to `~/.config`
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        config_dir.join("sumpoints").join("config.json")
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if overrides.storage_dir.is_some() {
            self.storage_dir = overrides.storage_dir;
        }
        if overrides.share_url.is_some() {
            self.share_url = overrides.share_url;
        }
        // Flags can only switch these on.
        self.vertical |= overrides.vertical;
        self.touch |= overrides.touch;
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(FileStore::default_dir)
    }

    /// Where interactive exports land, defaulting to the working directory
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Initial view settings
    pub fn view(&self) -> ViewState {
        ViewState {
            orientation: if self.vertical {
                Orientation::Vertical
            } else {
                Orientation::Horizontal
            },
            cumulative: self.cumulative,
            cutout: self.cutout,
            device: if self.touch {
                DeviceClass::Touch
            } else {
                DeviceClass::Mouse
            },
            ..ViewState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.view(), ViewState::default());
    }

    #[test]
    fn reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"vertical": true, "cumulative": "line", "cutout": "both"}"#).unwrap();
        let config = Config::load_from(&path);
        assert!(config.vertical);
        assert!(!config.touch);
        let view = config.view();
        assert_eq!(view.orientation, Orientation::Vertical);
        assert_eq!(view.cumulative, CumulativeMode::Line);
        assert_eq!(view.cutout, CutoutMode::Both);
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn cli_overrides_file() {
        let mut config = Config {
            storage_dir: Some("/from/file".into()),
            share_url: Some("https://file".into()),
            ..Config::default()
        };
        config.apply_overrides(Overrides {
            storage_dir: Some("/from/cli".into()),
            share_url: None,
            vertical: false,
            touch: true,
        });
        assert_eq!(config.storage_dir(), PathBuf::from("/from/cli"));
        assert_eq!(config.share_url.as_deref(), Some("https://file"));
        assert_eq!(config.view().device, DeviceClass::Touch);
    }
}
