//! Raw TCP printing (JetDirect / AppSocket).
//!
//! Network printers listening on port 9100 print whatever bytes arrive on
//! the socket.  There is no handshake, no status and no job tracking.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

use super::BackendError;
use crate::buffer::ByteBuffer;

/// The JetDirect raw port.
pub const DEFAULT_RAW_PORT: u16 = 9100;

const CHUNK_SIZE: usize = 8192;

/// Sends the materialized job to `host:port` over a fresh TCP connection.
///
/// Every address `host` resolves to is tried in order until one accepts.
/// `limit` bounds name resolution, each connect attempt and each write.
/// Every failure (resolution, refused connection, timeout, reset) is
/// [`BackendError::Unavailable`].
pub async fn send_to_host(
    host: &str,
    port: u16,
    job: &ByteBuffer,
    limit: Duration,
) -> Result<(), BackendError> {
    let bytes = job.materialize();
    let mut stream = connect_any(host, port, limit).await?;

    let mut sent = 0;
    for chunk in bytes.chunks(CHUNK_SIZE) {
        timeout(limit, stream.write_all(chunk))
            .await
            .map_err(|_| {
                BackendError::Unavailable(format!(
                    "raw print to {host}:{port} timed out after {sent} bytes"
                ))
            })?
            .map_err(|e| unavailable(host, port, "send failed", e))?;
        sent += chunk.len();
        debug!(sent, total = bytes.len(), "raw TCP progress");
    }

    // Flushes, then closes the write half so the printer sees end of job.
    stream
        .shutdown()
        .await
        .map_err(|e| unavailable(host, port, "shutdown failed", e))?;

    info!("sent {} bytes to {host}:{port}", bytes.len());
    Ok(())
}

async fn connect_any(host: &str, port: u16, limit: Duration) -> Result<TcpStream, BackendError> {
    let addrs: Vec<SocketAddr> = timeout(limit, lookup_host((host, port)))
        .await
        .map_err(|_| BackendError::Unavailable(format!("resolving {host} timed out")))?
        .map_err(|e| unavailable(host, port, "could not resolve", e))?
        .collect();

    let mut last_failure = format!("{host} resolved to no address");
    for addr in addrs {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                debug!("connected to {addr} for {host}:{port}");
                return Ok(stream);
            }
            Ok(Err(e)) => {
                debug!("connect to {addr} failed: {e}");
                last_failure = format!("connect to {addr} failed: {e}");
            }
            Err(_) => {
                debug!("connect to {addr} timed out");
                last_failure = format!("connect to {addr} timed out");
            }
        }
    }
    Err(BackendError::Unavailable(format!(
        "raw print to {host}:{port}: {last_failure}"
    )))
}

fn unavailable(host: &str, port: u16, what: &str, e: std::io::Error) -> BackendError {
    BackendError::Unavailable(format!("raw print to {host}:{port} {what}: {e}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
