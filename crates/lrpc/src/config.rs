//! Server configuration.

use std::net::{SocketAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};

use crate::error::{LrpcError, Result};

/// Listener settings for a [`crate::Server`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address. `:8000` is accepted and means all interfaces.
    pub bind: String,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub const DEFAULT_BIND: &'static str = ":8000";
    pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

    pub fn new(bind: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::DEFAULT_BIND.to_string(),
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Resolve a bind address.
///
/// A leading `:` with no host binds all interfaces, so `:8000` becomes
/// `0.0.0.0:8000`.
pub fn parse_bind_addr(bind: &str) -> Result<SocketAddr> {
    let bind = bind.trim();
    let normalized = match bind.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => bind.to_string(),
    };

    let mut addrs = normalized
        .to_socket_addrs()
        .map_err(|e| LrpcError::InvalidAddress {
            addr: bind.to_string(),
            message: e.to_string(),
        })?;

    addrs.next().ok_or_else(|| LrpcError::InvalidAddress {
        addr: bind.to_string(),
        message: "address did not resolve".to_string(),
    })
}
