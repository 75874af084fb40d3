//! Optional TOML configuration file.
//!
//! Every key is optional; missing keys fall back to the built-in defaults.
//!
//! ```toml
//! [server]
//! bind_host = "127.0.0.1"
//! ports = [8182, 8283, 8384, 8485]
//! secure_ports = [8181, 8282, 8383, 8484]
//! max_message_size = 2147483647
//!
//! # Optional: also serve wss:// on the paired secure port.
//! [tls]
//! cert = "/etc/printbridge/cert.pem"
//! key = "/etc/printbridge/key.pem"
//!
//! [printing]
//! charset = "UTF-8"
//! debug_sink = false
//! spooler = "lp"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use printbridge_core::{Charset, UnknownCharset};

use crate::domain::{BridgeConfig, TlsFiles};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `printing.charset` names an unsupported encoding.
    #[error(transparent)]
    Charset(#[from] UnknownCharset),

    /// A value parsed but cannot be used.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// The on-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub printing: PrintingSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Present only when the secure listener should run.
    #[serde(default)]
    pub tls: Option<TlsSection>,
}

/// Where the service listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Candidate ports, tried in order.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
    /// WSS ports, paired by index with `ports`.
    #[serde(default = "default_secure_ports")]
    pub secure_ports: Vec<u16>,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Defaults applied to every new print context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrintingSection {
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Start sessions on the Debug Sink.
    #[serde(default)]
    pub debug_sink: bool,
    #[serde(default = "default_spooler")]
    pub spooler: String,
}

/// PEM certificate chain and private key for `wss://`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsSection {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_host() -> String {
    BridgeConfig::default().bind_host
}
fn default_ports() -> Vec<u16> {
    BridgeConfig::default().candidate_ports
}
fn default_secure_ports() -> Vec<u16> {
    BridgeConfig::default().secure_ports
}
fn default_max_message_size() -> usize {
    BridgeConfig::default().max_message_size
}
fn default_charset() -> String {
    Charset::default().name().to_string()
}
fn default_spooler() -> String {
    BridgeConfig::default().spooler
}
fn default_log_level() -> String {
    BridgeConfig::default().log_level
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            ports: default_ports(),
            secure_ports: default_secure_ports(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for PrintingSection {
    fn default() -> Self {
        Self {
            charset: default_charset(),
            debug_sink: false,
            spooler: default_spooler(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Validates the file values and turns them into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Charset`] for an unknown charset and
    /// [`ConfigError::Invalid`] for an empty port list, an empty secure port
    /// list while `[tls]` is present, or a zero message size.
    pub fn into_bridge_config(self) -> Result<BridgeConfig, ConfigError> {
        if self.server.ports.is_empty() {
            return Err(ConfigError::Invalid("server.ports must not be empty".to_string()));
        }
        if self.tls.is_some() && self.server.secure_ports.is_empty() {
            return Err(ConfigError::Invalid(
                "server.secure_ports must not be empty when [tls] is set".to_string(),
            ));
        }
        if self.server.max_message_size == 0 {
            return Err(ConfigError::Invalid(
                "server.max_message_size must be positive".to_string(),
            ));
        }
        Ok(BridgeConfig {
            bind_host: self.server.bind_host,
            candidate_ports: self.server.ports,
            secure_ports: self.server.secure_ports,
            tls: self.tls.map(|tls| TlsFiles {
                cert_path: tls.cert,
                key_path: tls.key,
            }),
            max_message_size: self.server.max_message_size,
            default_charset: self.printing.charset.parse()?,
            debug_sink_at_start: self.printing.debug_sink,
            spooler: self.printing.spooler,
            log_level: self.logging.level,
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read (a missing file is an error
/// here: the path was given explicitly) and [`ConfigError::Parse`] if the
/// TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
