//! Configuration file handling.
//!
//! Reads `config.toml` from the platform config directory. Every section
//! defaults, so a missing or partial file is fine.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_TIMEOUT;

const CONFIG_DIR: &str = "lazyfleet";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub name: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            name: "mocha".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(CONFIG_DIR))
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

pub fn load() -> color_eyre::Result<AppConfig> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            debug!("no config directory found, using defaults");
            return Ok(AppConfig::default());
        }
    };

    if !path.exists() {
        debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    debug!(?path, "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: AppConfig =
            toml::from_str("[api]\nbase_url = \"https://fleet.example.com\"\ntimeout_secs = 10\n")
                .unwrap();
        assert_eq!(config.api.base_url, "https://fleet.example.com");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.theme.name, "mocha");
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout(), DEFAULT_TIMEOUT);
    }
}
