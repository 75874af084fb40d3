//! printbridge: local print service for web pages.
//!
//! Pages connect over a WebSocket, assemble a raw job (ZPL, EPL, ESC/POS...)
//! with `append` commands and send it to a local printer, a file, a USB
//! device or a network printer.
//!
//! # Usage
//!
//! ```text
//! printbridge [OPTIONS]
//!
//! Options:
//!   --config      <PATH>     TOML config file
//!   --bind        <HOST>     Listen address [default: 127.0.0.1]
//!   --ports       <LIST>     Candidate ports, comma separated [default: 8182,8283,8384,8485]
//!   --charset     <NAME>     Default charset for `append` [default: UTF-8]
//!   --debug-sink  [BOOL]     Start sessions on the Debug Printer
//!   --spooler     <PROGRAM>  Program used to submit OS print jobs [default: lp]
//!   --log-level   <LEVEL>    Log filter when RUST_LOG is unset [default: info]
//!   --secure-ports <LIST>    WSS ports paired with --ports [default: 8181,8282,8383,8484]
//!   --tls-cert    <PATH>     PEM certificate chain; enables wss:// (needs --tls-key)
//!   --tls-key     <PATH>     PEM private key (needs --tls-cert)
//!   --max-message-size <N>   Largest accepted frame or message in bytes
//! ```
//!
//! # Precedence
//!
//! Command-line flags (or their `PRINTBRIDGE_*` environment variables)
//! override the config file, which overrides the built-in defaults.
//!
//! | Variable                 | Flag           |
//! |--------------------------|----------------|
//! | `PRINTBRIDGE_CONFIG`     | `--config`     |
//! | `PRINTBRIDGE_BIND`       | `--bind`       |
//! | `PRINTBRIDGE_PORTS`      | `--ports`      |
//! | `PRINTBRIDGE_CHARSET`    | `--charset`    |
//! | `PRINTBRIDGE_DEBUG_SINK` | `--debug-sink` |
//! | `PRINTBRIDGE_SPOOLER`    | `--spooler`    |
//! | `PRINTBRIDGE_LOG_LEVEL`  | `--log-level`  |
//! | `PRINTBRIDGE_SECURE_PORTS` | `--secure-ports` |
//! | `PRINTBRIDGE_TLS_CERT`   | `--tls-cert`   |
//! | `PRINTBRIDGE_TLS_KEY`    | `--tls-key`    |
//! | `PRINTBRIDGE_MAX_MESSAGE_SIZE` | `--max-message-size` |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use printbridge_server::domain::{BridgeConfig, TlsFiles};
use printbridge_server::infrastructure::{load_config, run_server, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Local WebSocket print service.
///
/// Every option is optional so that unset flags fall through to the config
/// file and then to the defaults.
#[derive(Debug, Default, Parser)]
#[command(
    name = "printbridge",
    about = "Local WebSocket print service for web pages",
    version
)]
struct Cli {
    /// TOML config file.
    #[arg(long, env = "PRINTBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.  Keep it on loopback unless other machines
    /// must be able to print here.
    #[arg(long, env = "PRINTBRIDGE_BIND")]
    bind: Option<String>,

    /// Candidate ports, tried in order.
    #[arg(long, env = "PRINTBRIDGE_PORTS", value_delimiter = ',')]
    ports: Option<Vec<u16>>,

    /// Charset `append` uses until a page calls `setEncoding`.
    #[arg(long, env = "PRINTBRIDGE_CHARSET")]
    charset: Option<String>,

    /// Start every session on the Debug Printer.
    #[arg(
        long,
        env = "PRINTBRIDGE_DEBUG_SINK",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    debug_sink: Option<bool>,

    /// Program used to submit jobs to OS print queues.
    #[arg(long, env = "PRINTBRIDGE_SPOOLER")]
    spooler: Option<String>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "PRINTBRIDGE_LOG_LEVEL")]
    log_level: Option<String>,

    /// WSS ports, paired by index with `--ports`.
    #[arg(long, env = "PRINTBRIDGE_SECURE_PORTS", value_delimiter = ',')]
    secure_ports: Option<Vec<u16>>,

    /// PEM certificate chain.  Together with `--tls-key` this turns on the
    /// secure listener.
    #[arg(long, env = "PRINTBRIDGE_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key for `--tls-cert`.
    #[arg(long, env = "PRINTBRIDGE_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Largest WebSocket frame or message accepted, in bytes.
    #[arg(long, env = "PRINTBRIDGE_MAX_MESSAGE_SIZE")]
    max_message_size: Option<usize>,
}

impl Cli {
    /// Layers defaults, the config file and the CLI into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, a
    /// charset is unknown, a port list is empty, only half of the TLS pair
    /// is given, or the message limit is zero.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileConfig::default(),
        };
        let mut config = file.into_bridge_config().context("invalid config file")?;

        if let Some(bind) = self.bind {
            config.bind_host = bind;
        }
        if let Some(ports) = self.ports {
            anyhow::ensure!(!ports.is_empty(), "--ports must name at least one port");
            config.candidate_ports = ports;
        }
        if let Some(charset) = self.charset {
            config.default_charset = charset
                .parse()
                .with_context(|| format!("invalid --charset '{charset}'"))?;
        }
        if let Some(debug_sink) = self.debug_sink {
            config.debug_sink_at_start = debug_sink;
        }
        if let Some(spooler) = self.spooler {
            config.spooler = spooler;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(secure_ports) = self.secure_ports {
            config.secure_ports = secure_ports;
        }
        match (self.tls_cert, self.tls_key) {
            (Some(cert_path), Some(key_path)) => {
                config.tls = Some(TlsFiles {
                    cert_path,
                    key_path,
                });
            }
            (None, None) => {}
            _ => anyhow::bail!("--tls-cert and --tls-key must be given together"),
        }
        if config.tls.is_some() {
            anyhow::ensure!(
                !config.secure_ports.is_empty(),
                "--secure-ports must name at least one port when TLS is on"
            );
        }
        if let Some(limit) = self.max_message_size {
            anyhow::ensure!(limit > 0, "--max-message-size must be positive");
            config.max_message_size = limit;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_bridge_config()?;

    // `RUST_LOG` wins over the configured level when it is set.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "printbridge starting: host={}, ports={:?}, charset={}, spooler={}, tls={}",
        config.bind_host,
        config.candidate_ports,
        config.default_charset,
        config.spooler,
        config.tls.is_some()
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    // The accept loop in `run_server` checks this flag every 200 ms.
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("printbridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use printbridge_core::Charset;

    use super::*;

    #[test]
    fn test_cli_without_flags_gives_defaults() {
        // Arrange
        let cli = Cli::default();

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_cli_parses_port_list() {
        let cli = Cli::parse_from(["printbridge", "--ports", "9001,9002"]);
        assert_eq!(cli.ports, Some(vec![9001, 9002]));
    }

    #[test]
    fn test_cli_debug_sink_flag_without_value() {
        let cli = Cli::parse_from(["printbridge", "--debug-sink"]);
        assert_eq!(cli.debug_sink, Some(true));
    }

    #[test]
    fn test_cli_debug_sink_explicit_false() {
        let cli = Cli::parse_from(["printbridge", "--debug-sink", "false"]);
        assert_eq!(cli.debug_sink, Some(false));
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = Cli {
            bind: Some("0.0.0.0".to_string()),
            charset: Some("latin1".to_string()),
            spooler: Some("lpr".to_string()),
            ..Cli::default()
        };

        let config = cli.into_bridge_config().unwrap();

        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.default_charset, Charset::Iso8859_1);
        assert_eq!(config.spooler, "lpr");
        assert_eq!(config.candidate_ports, vec![8182, 8283, 8384, 8485]);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        // Arrange: the file sets both ports and spooler; the CLI only ports.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printbridge.toml");
        std::fs::write(
            &path,
            "[server]\nports = [7001]\n[printing]\nspooler = \"lpr\"\n",
        )
        .unwrap();
        let cli = Cli {
            config: Some(path),
            ports: Some(vec![7002]),
            ..Cli::default()
        };

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config.candidate_ports, vec![7002]);
        assert_eq!(config.spooler, "lpr");
    }

    #[test]
    fn test_cli_tls_pair_enables_secure_listener() {
        let cli = Cli::parse_from([
            "printbridge",
            "--tls-cert",
            "/etc/pb/cert.pem",
            "--tls-key",
            "/etc/pb/key.pem",
            "--secure-ports",
            "9443,9444",
            "--max-message-size",
            "65536",
        ]);

        let config = cli.into_bridge_config().unwrap();

        assert_eq!(
            config.tls,
            Some(TlsFiles {
                cert_path: PathBuf::from("/etc/pb/cert.pem"),
                key_path: PathBuf::from("/etc/pb/key.pem"),
            })
        );
        assert_eq!(config.secure_ports, vec![9443, 9444]);
        assert_eq!(config.max_message_size, 65536);
    }

    #[test]
    fn test_cli_tls_cert_without_key_is_rejected() {
        let result = Cli::try_parse_from(["printbridge", "--tls-cert", "/etc/pb/cert.pem"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_message_size_is_an_error() {
        let cli = Cli {
            max_message_size: Some(0),
            ..Cli::default()
        };
        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_invalid_charset_is_an_error() {
        let cli = Cli {
            charset: Some("klingon".to_string()),
            ..Cli::default()
        };
        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/printbridge.toml")),
            ..Cli::default()
        };
        assert!(cli.into_bridge_config().is_err());
    }
}
