//! printbridge-server library crate.
//!
//! A local WebSocket service that lets web pages print raw commands on this
//! machine's printers.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Web page (text commands over WebSocket)
//!         ↕
//! [printbridge-server]
//!   ├── domain/           Pure types: Command, BridgeConfig
//!   ├── application/      Session, verb table, print context
//!   └── infrastructure/
//!         ├── listener/   First-free-port binding
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         └── config_file/ Optional TOML configuration
//!         ↕
//! [printbridge-core]  buffers, backends, USB
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `printbridge-core` only.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: command routing and per-session state.
pub mod application;

/// Infrastructure layer: listener, WebSocket server and config file.
pub mod infrastructure;
