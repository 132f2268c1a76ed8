//! Configuration management for Draftgate

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    pub publisher: Option<PublisherConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Forbid a draft's author from deciding their own draft.
    #[serde(default = "default_true")]
    pub prevent_self_approve: bool,
    /// Offset applied when a schedule time is given without a zone.
    /// Stored times are always UTC.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            prevent_self_approve: true,
            utc_offset_hours: default_utc_offset(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_utc_offset() -> i32 {
    9
}

/// Credentials for the X publishing API. Each field falls back to a
/// `DRAFTGATE_X_*` environment variable when the config omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_secret: Option<String>,
}

impl PublisherConfig {
    fn field(explicit: &Option<String>, env_var: &str, name: &str) -> Result<String> {
        if let Some(value) = explicit {
            return Ok(value.clone());
        }
        std::env::var(env_var)
            .map_err(|_| ConfigError::MissingField(name.to_string()).into())
    }

    pub fn resolve_api_key(&self) -> Result<String> {
        Self::field(&self.api_key, "DRAFTGATE_X_API_KEY", "publisher.api_key")
    }

    pub fn resolve_api_secret(&self) -> Result<String> {
        Self::field(
            &self.api_secret,
            "DRAFTGATE_X_API_SECRET",
            "publisher.api_secret",
        )
    }

    pub fn resolve_access_token(&self) -> Result<String> {
        Self::field(
            &self.access_token,
            "DRAFTGATE_X_ACCESS_TOKEN",
            "publisher.access_token",
        )
    }

    pub fn resolve_access_secret(&self) -> Result<String> {
        Self::field(
            &self.access_secret,
            "DRAFTGATE_X_ACCESS_SECRET",
            "publisher.access_secret",
        )
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/draftgate/drafts.db".to_string(),
            },
            review: ReviewConfig::default(),
            publisher: None,
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("DRAFTGATE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("draftgate").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("draftgate"))
}
