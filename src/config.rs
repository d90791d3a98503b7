// Configuration - Optional TOML file under the user config directory
// Every field has a default; a missing or broken file never stops the app

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const APP_NAME: &str = "synth_playground";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Directory of the durable snapshot (defaults to `<data_dir>/synth_playground`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    /// Directory holding `demos.json` and its documents (bundled demos otherwise)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_dir: Option<PathBuf>,
    /// Minimum interval between two applied slider values, in milliseconds
    pub slider_interval_ms: u64,
    /// Output gain in [0, 1]
    pub master_gain: f32,
    /// `tracing` filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            demo_dir: None,
            slider_interval_ms: 16,
            master_gain: 0.8,
            log_filter: "info".to_string(),
        }
    }
}

impl PlaygroundConfig {
    /// `<config_dir>/synth_playground/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read `path`. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml(&text).map(Some)
    }

    /// Load from `path` (or the default location), falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Self::default(),
            },
        };

        match Self::read(&path) {
            Ok(Some(config)) => {
                debug!(path = %path.display(), "configuration loaded");
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = %e, "ignoring configuration file");
                Self::default()
            }
        }
    }

    pub fn slider_interval(&self) -> Duration {
        Duration::from_millis(self.slider_interval_ms)
    }

    pub fn master_gain(&self) -> f32 {
        if self.master_gain.is_nan() {
            return 0.0;
        }
        self.master_gain.clamp(0.0, 1.0)
    }
}
