//! Server configuration
//!
//! Defaults can be overridden from the environment:
//! - RDSH_MAX_COMMANDS (pipeline length limit)
//! - RDSH_MAX_REQUEST (request size limit in bytes)
//! - RDSH_STATE_SCOPE (connection, process)

use crate::config::Limits;
use crate::runtime::StateScope;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_IFACE: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 1234;

/// How accepted connections are served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyMode {
    /// One connection at a time, on the accepting thread
    #[default]
    SingleThreaded,
    /// A detached worker thread per connection
    MultiThreaded,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub iface: IpAddr,
    pub port: u16,
    pub mode: ConcurrencyMode,
    pub limits: Limits,
    pub state_scope: StateScope,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            iface: DEFAULT_IFACE,
            port: DEFAULT_PORT,
            mode: ConcurrencyMode::default(),
            limits: Limits::default(),
            state_scope: StateScope::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults with `RDSH_*` overrides applied.
    pub fn from_env() -> Self {
        let state_scope = match env::var("RDSH_STATE_SCOPE") {
            Ok(value) => StateScope::from_str(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "unknown RDSH_STATE_SCOPE, using connection");
                StateScope::Connection
            }),
            Err(_) => StateScope::default(),
        };

        Self {
            limits: Limits::from_env(),
            state_scope,
            ..Self::default()
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.iface, self.port)
    }

    pub fn is_threaded(&self) -> bool {
        self.mode == ConcurrencyMode::MultiThreaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr().to_string(), "0.0.0.0:1234");
        assert_eq!(config.mode, ConcurrencyMode::SingleThreaded);
        assert_eq!(config.state_scope, StateScope::Connection);
        assert!(!config.is_threaded());
    }
}
