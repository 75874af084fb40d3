//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding the first free candidate port, or port pair when TLS is on
//!    (see [`bind_first_free`] and [`bind_first_free_pair`]).
//! 2. Accepting incoming TCP connections from pages.
//! 3. Upgrading each connection to a WebSocket session, through TLS on the
//!    secure listener.
//! 4. Feeding every text frame into that connection's [`Session`].
//! 5. Stopping the accept loops when the `running` flag is cleared.
//!
//! Each connection runs in its own Tokio task, so one page printing a large
//! job never delays another page's commands.  Within a connection, frames
//! are handled strictly in arrival order.  Commands reach printers, files
//! and sockets through blocking calls, so the session itself is moved onto
//! Tokio's blocking pool for every frame and handed back afterwards.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::application::{Dispatcher, Session};
use crate::domain::BridgeConfig;
use crate::infrastructure::listener::{bind_first_free, bind_first_free_pair};
use crate::infrastructure::text_frames::TextFrames;
use crate::infrastructure::tls::load_acceptor;

/// How often the accept loop wakes up to check the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listeners and serves until `running` is cleared.
///
/// Without TLS only the first free plain port is bound.  With TLS the
/// first index whose plain and secure ports are both free is bound and both
/// listeners run side by side.
///
/// # Errors
///
/// Returns an error if the TLS files cannot be loaded or no candidate port
/// (or pair) can be bound.
pub async fn run_server(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let Some(tls) = config.tls.clone() else {
        let (listener, port) = bind_first_free(&config.bind_host, &config.candidate_ports)
            .await
            .context("failed to start the print service")?;
        info!("print service listening on ws://{}:{port}", config.bind_host);
        return serve(listener, config, running).await;
    };

    let acceptor = load_acceptor(&tls).context("failed to load the TLS certificate")?;
    let pair = bind_first_free_pair(
        &config.bind_host,
        &config.candidate_ports,
        &config.secure_ports,
    )
    .await
    .context("failed to start the print service")?;
    info!(
        "print service listening on ws://{host}:{} and wss://{host}:{}",
        pair.plain_port,
        pair.secure_port,
        host = config.bind_host
    );

    let config = Arc::new(config);
    let dispatcher = Arc::new(Dispatcher::new());
    let secure = tokio::spawn(accept_loop(
        pair.secure,
        Some(acceptor),
        Arc::clone(&config),
        Arc::clone(&dispatcher),
        Arc::clone(&running),
    ));
    accept_loop(pair.plain, None, config, dispatcher, running).await;
    secure.await.context("secure accept loop panicked")?;
    Ok(())
}

/// Runs the plain accept loop on an already bound listener until `running`
/// is set to `false`.
///
/// Sessions that are already connected keep running after the loop stops;
/// they end when their page disconnects or the process exits.
pub async fn serve(
    listener: TcpListener,
    config: BridgeConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let dispatcher = Arc::new(Dispatcher::new());
    accept_loop(listener, None, Arc::new(config), dispatcher, running).await;
    Ok(())
}

/// Like [`serve`], but every connection is a TLS handshake first.
pub async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    config: BridgeConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let dispatcher = Arc::new(Dispatcher::new());
    accept_loop(listener, Some(acceptor), Arc::new(config), dispatcher, running).await;
    Ok(())
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    config: Arc<BridgeConfig>,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout lets the loop notice the shutdown flag even when
        // no page is connecting.
        match timeout(SHUTDOWN_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let cfg = Arc::clone(&config);
                let routes = Arc::clone(&dispatcher);
                let tls = acceptor.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, tls, routes, cfg).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {
                // No new connection in the last 200 ms.
            }
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-connection task.  Logs how the session ended.
async fn handle_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<BridgeConfig>,
) {
    let result = match acceptor {
        Some(acceptor) => match acceptor.accept(raw_stream).await {
            Ok(tls_stream) => run_session(tls_stream, peer_addr, dispatcher, config).await,
            Err(e) => {
                Err(anyhow::Error::new(e).context(format!("TLS handshake failed with {peer_addr}")))
            }
        },
        None => run_session(raw_stream, peer_addr, dispatcher, config).await,
    };
    if let Err(e) = result {
        debug!("connection {peer_addr} ended with error: {e:#}");
    }
}

/// Completes the WebSocket handshake and pumps frames into a [`Session`]
/// until the page disconnects.
///
/// A text frame that is not valid UTF-8 is reported through `on_error` and
/// the session continues.  Transport errors end it.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails or a blocking-pool
/// task panics.
async fn run_session<S>(
    stream: S,
    peer_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    config: Arc<BridgeConfig>,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (stream, mut origins) = TextFrames::new(stream);
    let limits = ws_config(config.max_message_size);
    let mut ws_stream = accept_async_with_config(stream, Some(limits))
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let mut session = Session::new(peer_addr, dispatcher, config);
    session.on_connect();

    while let Some(frame) = ws_stream.next().await {
        match frame {
            Ok(WsMessage::Binary(data)) => {
                if !was_text(&mut origins) {
                    debug!(
                        "session {peer_addr}: binary frame ({} bytes) ignored",
                        data.len()
                    );
                    continue;
                }
                match String::from_utf8(data) {
                    Ok(text) => {
                        session = spawn_blocking(move || {
                            session.on_message(&text);
                            session
                        })
                        .await
                        .context("session task panicked")?;
                    }
                    Err(e) => session.on_error(&e),
                }
            }
            Ok(WsMessage::Text(text)) => {
                session = spawn_blocking(move || {
                    session.on_message(&text);
                    session
                })
                .await
                .context("session task panicked")?;
            }
            Ok(WsMessage::Close(_)) => {
                debug!("session {peer_addr}: Close frame received");
                break;
            }
            // Pings are answered by tungstenite on the next read.
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {}
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
            Err(e) => {
                // tungstenite does not yield anything after an error.
                if matches!(e, WsError::Capacity(_)) {
                    warn!("session {peer_addr}: frame over the size limit");
                }
                session.on_error(&e);
                break;
            }
        }
    }

    spawn_blocking(move || session.on_close())
        .await
        .context("session task panicked")?;
    Ok(())
}

/// Pops the origin of the next data message; anything unrecorded counts
/// as binary.
fn was_text(origins: &mut UnboundedReceiver<bool>) -> bool {
    origins.try_recv().unwrap_or(false)
}

fn ws_config(max_message_size: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_size);
    config.max_frame_size = Some(max_message_size);
    config
}

// ── Tests ─────────────────────────────────────────────────────────────────────
