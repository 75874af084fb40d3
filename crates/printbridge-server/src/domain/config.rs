//! Service configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! The infrastructure layer fills it from defaults, an optional TOML file and
//! the command line (in increasing order of precedence); nothing in here reads
//! the environment.

use std::path::PathBuf;

use printbridge_core::Charset;

/// Candidate ports, tried in order until one binds.
pub const DEFAULT_PORTS: [u16; 4] = [8182, 8283, 8384, 8485];

/// Secure (WSS) ports, paired by index with [`DEFAULT_PORTS`].
pub const DEFAULT_SECURE_PORTS: [u16; 4] = [8181, 8282, 8383, 8484];

/// Largest WebSocket message or frame accepted: 2 GiB - 1.
///
/// Pages send whole images and label batches as one `append64` frame.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = i32::MAX as usize;

/// PEM files for the secure listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Certificate chain, leaf first.
    pub cert_path: PathBuf,
    /// PKCS#8, PKCS#1 or SEC1 private key.
    pub key_path: PathBuf,
}

/// All runtime configuration for the print service.
///
/// Build this struct once at startup and wrap it in an `Arc` so it can be
/// shared cheaply across all session tasks.
///
/// # Example
///
/// ```rust
/// use printbridge_server::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.candidate_ports, vec![8182, 8283, 8384, 8485]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Host or IP the listener binds to.  Defaults to loopback: only pages
    /// opened on this machine should be able to print.
    pub bind_host: String,

    /// Ports tried in order; the first one that binds wins.
    pub candidate_ports: Vec<u16>,

    /// WSS ports, used only when `tls` is set.  `secure_ports[i]` is bound
    /// together with `candidate_ports[i]`.
    pub secure_ports: Vec<u16>,

    /// Certificate and key for the secure listener.  `None` serves plain
    /// `ws://` only.
    pub tls: Option<TlsFiles>,

    /// Upper bound for one incoming WebSocket message, and for one frame.
    pub max_message_size: usize,

    /// Charset `append` encodes text with until a page calls `setEncoding`.
    pub default_charset: Charset,

    /// When set, every new session starts with the Debug Sink selected
    /// instead of no printer.
    pub debug_sink_at_start: bool,

    /// Program invoked to submit jobs to OS print queues.
    pub spooler: String,

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for BridgeConfig {
    /// | Field               | Default                      |
    /// |---------------------|------------------------------|
    /// | bind_host           | `127.0.0.1`                  |
    /// | candidate_ports     | `8182, 8283, 8384, 8485`     |
    /// | secure_ports        | `8181, 8282, 8383, 8484`     |
    /// | tls                 | `None`                       |
    /// | max_message_size    | 2 GiB - 1                    |
    /// | default_charset     | UTF-8                        |
    /// | debug_sink_at_start | `false`                      |
    /// | spooler             | `lp`                         |
    /// | log_level           | `info`                       |
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            candidate_ports: DEFAULT_PORTS.to_vec(),
            secure_ports: DEFAULT_SECURE_PORTS.to_vec(),
            tls: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            default_charset: Charset::default(),
            debug_sink_at_start: false,
            spooler: printbridge_core::backend::system::DEFAULT_SPOOLER.to_string(),
            log_level: "info".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
