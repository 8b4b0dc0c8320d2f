//! Editor configuration.
//!
//! Values are resolved from built-in defaults, then an optional TOML file, then
//! `DATAMAP_*` environment variables. Command-line flags are applied on top by
//! the binary through [`EditorConfig::apply_overrides`].

use crate::constants::AUTOSAVE_QUIET_PERIOD;
use crate::error::ConfigError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "datamap.toml";

/// Runtime settings for the editor and its persistence bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Base URL of the remote store; `/load` and `/save` are appended
    pub base_url: String,
    /// Identifier of the entity whose diagram is edited
    pub entity_id: String,
    /// Quiet period before an autosave fires, in milliseconds
    pub autosave_quiet_ms: u64,
    /// Timeout for a single load or save request, in seconds
    pub request_timeout_secs: u64,
    /// Keep diagrams in memory instead of talking to the remote store
    pub offline: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/datamap".to_string(),
            entity_id: String::new(),
            autosave_quiet_ms: AUTOSAVE_QUIET_PERIOD.as_millis() as u64,
            request_timeout_secs: 10,
            offline: false,
        }
    }
}

/// Overrides supplied on the command line; `None` leaves the value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Entity identifier
    pub entity_id: Option<String>,
    /// Remote store base URL
    pub base_url: Option<String>,
    /// Force offline mode
    pub offline: bool,
}

impl EditorConfig {
    /// Parses a config from TOML text.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Reads a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    /// Resolves the configuration from file and environment.
    ///
    /// `explicit` (or `DATAMAP_CONFIG`) must exist if given; otherwise
    /// [`DEFAULT_CONFIG_FILE`] is used only when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os("DATAMAP_CONFIG").map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `DATAMAP_BASE_URL` and `DATAMAP_ENTITY_ID` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATAMAP_BASE_URL") {
            self.base_url = url;
        }
        if let Some(entity) = lookup("DATAMAP_ENTITY_ID") {
            self.entity_id = entity;
        }
    }

    /// Applies command-line overrides.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(entity) = overrides.entity_id {
            self.entity_id = entity;
        }
        if let Some(url) = overrides.base_url {
            self.base_url = url;
        }
        self.offline |= overrides.offline;
    }

    /// Checks the merged configuration before the editor starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "an entity id is required (--entity or DATAMAP_ENTITY_ID)".to_string(),
            ));
        }
        if self.autosave_quiet_ms == 0 {
            return Err(ConfigError::Invalid(
                "autosave_quiet_ms must be greater than zero".to_string(),
            ));
        }
        if !self.offline && !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url `{}` must be an http(s) URL",
                self.base_url
            )));
        }
        Ok(())
    }

    /// The autosave quiet period.
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_ms)
    }

    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
