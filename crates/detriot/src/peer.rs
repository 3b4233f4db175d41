//! Node and proxy roles. Neither hosts services yet.

use std::net::SocketAddr;

use lrpc::parse_bind_addr;
use tracing::info;

use crate::config::{Role, RoleConfig};

/// Check the role's bind address and report it. Returns the parsed address.
pub fn run(role: Role, config: &RoleConfig) -> lrpc::Result<SocketAddr> {
    let addr = parse_bind_addr(&config.bind)?;
    info!("{} bind: {}", role.name(), addr);
    info!("{} has no services registered, exiting", role.name());
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrpc::LrpcError;

    #[test]
    fn test_default_config_binds_all_interfaces() {
        let addr = run(Role::Node, &RoleConfig::default()).unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_configured_bind_address() {
        let config = RoleConfig {
            bind: "127.0.0.1:9200".to_string(),
            ..RoleConfig::default()
        };
        let addr = run(Role::Proxy, &config).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9200");
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = RoleConfig {
            bind: "nowhere".to_string(),
            ..RoleConfig::default()
        };
        let err = run(Role::Node, &config).unwrap_err();
        assert!(matches!(err, LrpcError::InvalidAddress { .. }));
    }
}
