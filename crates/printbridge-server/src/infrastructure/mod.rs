//! Infrastructure layer for printbridge-server.
//!
//! Everything that touches the outside world on the service side: binding
//! the ports, TLS, the WebSocket accept loop and reading the config file.
//!
//! # What does NOT belong here?
//!
//! - Command semantics (that is the application layer)
//! - Printer and device I/O (that is `printbridge-core`)

pub mod config_file;
pub mod listener;
pub mod text_frames;
pub mod tls;
pub mod ws_server;

pub use config_file::{load_config, ConfigError, FileConfig};
pub use listener::{bind_first_free, bind_first_free_pair, ListenerError, PortPair};
pub use text_frames::TextFrames;
pub use tls::{load_acceptor, TlsError};
pub use ws_server::{run_server, serve, serve_tls};
