//! Domain layer for printbridge-server.
//!
//! Pure types with no I/O: the command format pages speak and the service
//! configuration.  Nothing here touches sockets, files or the environment.

pub mod command;
pub mod config;

pub use command::Command;
pub use config::{
    BridgeConfig, TlsFiles, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORTS, DEFAULT_SECURE_PORTS,
};
