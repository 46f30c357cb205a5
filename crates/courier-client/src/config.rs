//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/courier/config.toml` by default:
//!
//! ```toml
//! [ttl]
//! default_ttl = 30.0
//! default_notification_ttl = 300.0
//!
//! [server]
//! socket_path = "/run/user/1000/courier.sock"
//! timeout = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::TtlDefaults;
use crate::error::ConfigError;
use crate::socket::UnixSocketTransport;

/// Configuration for courier callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// TTLs applied to calls that do not set one.
    pub ttl: TtlSettings,

    /// Server/connection settings.
    pub server: ServerSettings,
}

/// Default TTLs in seconds. Unset means requests never expire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlSettings {
    pub default_ttl: Option<f64>,
    /// Overrides `default_ttl` for calls expecting a response.
    pub default_rpc_ttl: Option<f64>,
    /// Overrides `default_ttl` for notifications.
    pub default_notification_ttl: Option<f64>,
}

/// Server/connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Path to the server socket.
    pub socket_path: Option<PathBuf>,

    /// Connection timeout in seconds.
    pub timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout: 5,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("courier")
            .join("config.toml")
    }

    pub fn ttl_defaults(&self) -> TtlDefaults {
        TtlDefaults::new(
            self.ttl.default_ttl,
            self.ttl.default_rpc_ttl,
            self.ttl.default_notification_ttl,
        )
    }

    /// The configured socket, or the server's default one.
    pub fn socket_path(&self) -> PathBuf {
        self.server
            .socket_path
            .clone()
            .unwrap_or_else(courier_server::default_socket_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout)
    }

    /// A socket transport for the configured server.
    pub fn transport(&self) -> UnixSocketTransport {
        UnixSocketTransport::new(self.socket_path(), self.timeout())
    }
}
