//! Daemon configuration
//!
//! A small JSON file with serde defaults: where the control socket
//! lives, and the per-bridge tunables every bridge created by the daemon
//! starts from. Every field is optional; an absent config file means all
//! defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeConfig;
use crate::error::ConfigError;

/// Default control-socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/vbridge.sock";

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Unix-domain socket the daemon listens on and clients connect to.
    pub socket_path: PathBuf,

    /// Defaults applied to every bridge the daemon creates.
    pub bridge: BridgeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            bridge: BridgeConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid configuration JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
