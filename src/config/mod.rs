//! Configuration management

use crate::infrastructure::transport::LoopbackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub demo: DemoConfig,
    pub transport: LoopbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// How many back-to-back calls the demo places
    pub call_count: usize,
    /// How long to wait for both transports to report a usable path
    pub connect_timeout_ms: u64,
    /// Where the event timeline is exported as JSON; unset to skip
    pub timeline_path: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            call_count: 2,
            connect_timeout_ms: 1000,
            timeline_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            demo: DemoConfig::default(),
            transport: LoopbackConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load from the file named by `CONFAB_CONFIG`, or fall back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("CONFAB_CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }
}
