//! Role configuration files.
//!
//! Each role reads a JSON file, `conf/<role>.json` unless overridden:
//!
//! ```json
//! {
//!     "bind": ":8000",
//!     "max_body_bytes": 2097152,
//!     "log": { "level": "info", "err_level": "error" }
//! }
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use lrpc::{LogConfig, ServerConfig};
use serde::Deserialize;
use thiserror::Error;

/// Process role selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Node,
    Proxy,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Node => "node",
            Role::Proxy => "proxy",
        }
    }

    pub fn default_config_path(self) -> PathBuf {
        PathBuf::from("conf").join(format!("{}.json", self.name()))
    }

    /// Whether the role refuses to start without its config file.
    pub fn requires_config(self) -> bool {
        matches!(self, Role::Master)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid log settings: {0}")]
    Log(#[from] lrpc::LrpcError),
}

/// Console log thresholds, by level name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: String,
    pub err_level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            err_level: "error".to_string(),
        }
    }
}

/// Settings shared by every role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoleConfig {
    pub bind: String,
    pub max_body_bytes: usize,
    pub log: LogSettings,
}

impl Default for RoleConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            bind: server.bind,
            max_body_bytes: server.max_body_bytes,
            log: LogSettings::default(),
        }
    }
}

impl RoleConfig {
    /// Load a config file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a config file, returning `None` if it does not exist.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(Some(config)),
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }

    /// Log thresholds; `debug` lowers the stdout threshold to debug.
    pub fn log_config(&self, debug: bool) -> Result<LogConfig, ConfigError> {
        let mut config = LogConfig::from_names(&self.log.level, &self.log.err_level)?;
        if debug && config.out_level < tracing::Level::DEBUG {
            config.out_level = tracing::Level::DEBUG;
        }
        Ok(config)
    }
}
