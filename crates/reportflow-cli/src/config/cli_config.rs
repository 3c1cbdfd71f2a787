//! CLI configuration file support
//!
//! Loads configuration from ~/.config/reportflow/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default settings
    #[serde(default)]
    pub default: DefaultConfig,
    /// Delivery channel settings
    #[serde(default)]
    pub telegram: TelegramSection,
}

/// Default configuration values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Site profile used when `--profile` is not given
    pub profile: Option<PathBuf>,
    /// Destination for finished documents
    pub output_dir: Option<PathBuf>,
    /// Directory for the rolling log files
    pub log_dir: Option<PathBuf>,
    /// Directory holding node_modules/playwright
    pub node_dir: Option<PathBuf>,
    /// Run the browser headless (default true)
    pub headless: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl CliConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reportflow").join("config.toml"))
    }

    pub fn headless(&self) -> bool {
        self.default.headless.unwrap_or(true)
    }
}
