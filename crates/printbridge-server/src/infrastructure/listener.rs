//! Binding the service port.
//!
//! Pages do not know which port the service ended up on, so they try a
//! short fixed list.  The service binds the first one that is free.

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Error raised when the service cannot start listening.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Every candidate port failed to bind.
    #[error("no free port on {host} among {ports:?}")]
    NoFreePort { host: String, ports: Vec<u16> },

    /// No index had both its plain and its secure port free.
    #[error("no free port pair on {host} among {ports:?} / {secure_ports:?}")]
    NoFreePair {
        host: String,
        ports: Vec<u16>,
        secure_ports: Vec<u16>,
    },
}

/// A plain and a secure listener bound at the same candidate index.
#[derive(Debug)]
pub struct PortPair {
    pub plain: TcpListener,
    pub plain_port: u16,
    pub secure: TcpListener,
    pub secure_port: u16,
}

/// Binds `host` on the first port in `ports` that accepts the bind.
///
/// Any bind failure (port in use, permission denied, address not
/// available) moves on to the next candidate.  Returns the listener and the
/// port it is bound to.
///
/// # Errors
///
/// [`ListenerError::NoFreePort`] when no candidate binds, including when
/// `ports` is empty.
pub async fn bind_first_free(host: &str, ports: &[u16]) -> Result<(TcpListener, u16), ListenerError> {
    for &port in ports {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                // Port 0 asks the OS for any free port; report the real one.
                let bound = listener.local_addr().map(|a| a.port()).unwrap_or(port);
                info!("listening on {host}:{bound}");
                return Ok((listener, bound));
            }
            Err(e) => debug!("cannot bind {host}:{port}: {e}"),
        }
    }

    Err(ListenerError::NoFreePort {
        host: host.to_string(),
        ports: ports.to_vec(),
    })
}

/// Binds `ports[i]` and `secure_ports[i]` for the first index `i` where both
/// binds succeed.
///
/// Pages pair `ws://host:ports[i]` with `wss://host:secure_ports[i]`, so a
/// pair is only usable as a whole.  When either half fails, both are
/// released and the next index is tried.  Extra entries in the longer list
/// are ignored.
///
/// # Errors
///
/// [`ListenerError::NoFreePair`] when no index binds both ports.
pub async fn bind_first_free_pair(
    host: &str,
    ports: &[u16],
    secure_ports: &[u16],
) -> Result<PortPair, ListenerError> {
    for (&port, &secure_port) in ports.iter().zip(secure_ports) {
        let plain = match TcpListener::bind((host, port)).await {
            Ok(listener) => listener,
            Err(e) => {
                debug!("cannot bind {host}:{port}: {e}");
                continue;
            }
        };
        let secure = match TcpListener::bind((host, secure_port)).await {
            Ok(listener) => listener,
            Err(e) => {
                debug!("cannot bind secure {host}:{secure_port}: {e}; trying next pair");
                continue;
            }
        };
        let plain_port = plain.local_addr().map(|a| a.port()).unwrap_or(port);
        let secure_port = secure.local_addr().map(|a| a.port()).unwrap_or(secure_port);
        info!("listening on {host}:{plain_port} and {host}:{secure_port} (TLS)");
        return Ok(PortPair {
            plain,
            plain_port,
            secure,
            secure_port,
        });
    }

    Err(ListenerError::NoFreePair {
        host: host.to_string(),
        ports: ports.to_vec(),
        secure_ports: secure_ports.to_vec(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
