//! Remote shell server and client
//!
//! - `protocol`: NUL-terminated requests, sentinel-terminated responses
//! - `session`: per-connection request loop
//! - `server`: TCP accept loop, serial or thread-per-connection
//! - `client`: thin client speaking the protocol
//! - `config`: server settings and environment overrides

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod session;

pub use client::RemoteClient;
pub use config::{ConcurrencyMode, ServerConfig};
pub use protocol::SENTINEL;
pub use server::{Server, ServerHandle};
pub use session::{Session, SessionEnd};
