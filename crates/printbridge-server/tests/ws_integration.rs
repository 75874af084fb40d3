//! End-to-end tests: WebSocket clients assemble jobs and print them to
//! files through the running server.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::SinkExt;
use printbridge_server::domain::BridgeConfig;
use printbridge_server::infrastructure::{bind_first_free, serve};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::frame::{
            coding::{Data, OpCode},
            Frame,
        },
        Message,
    },
};

/// Starts the server on an OS-assigned port.
async fn start(config: BridgeConfig) -> (u16, Arc<AtomicBool>, JoinHandle<anyhow::Result<()>>) {
    let (listener, port) = bind_first_free("127.0.0.1", &[0]).await.unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(serve(listener, config, Arc::clone(&running)));
    (port, running, server)
}

/// Polls until `path` holds exactly `len` bytes or `limit` elapses.
async fn wait_for_len(path: &std::path::Path, len: usize, limit: Duration) -> Option<Vec<u8>> {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if let Ok(data) = tokio::fs::read(path).await {
            if data.len() == len {
                return Some(data);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

/// Polls until `path` has content or `limit` elapses.
async fn wait_for_file(path: &std::path::Path, limit: Duration) -> Option<Vec<u8>> {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if let Ok(data) = tokio::fs::read(path).await {
            if !data.is_empty() {
                return Some(data);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

#[tokio::test]
async fn test_client_prints_to_file_over_websocket() {
    // Arrange: serve on an OS-assigned port.
    let (listener, port) = bind_first_free("127.0.0.1", &[0]).await.unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(serve(listener, BridgeConfig::default(), Arc::clone(&running)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ws-job.txt");

    // Act
    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    ws.send(Message::Text("qzReady".into())).await.unwrap();
    ws.send(Message::Text("append hello ".into())).await.unwrap();
    ws.send(Message::Text("append64 d29ybGQ=".into())).await.unwrap();
    ws.send(Message::Text(format!("printToFile {}", path.display())))
        .await
        .unwrap();
    ws.close(None).await.unwrap();

    // Assert
    let written = wait_for_file(&path, Duration::from_secs(5)).await;
    assert_eq!(written.as_deref(), Some(&b"hello world"[..]));

    running.store(false, Ordering::Relaxed);
    let stopped = tokio::time::timeout(Duration::from_secs(2), server).await;
    assert!(stopped.is_ok(), "accept loop must stop after the flag is cleared");
}

#[tokio::test]
async fn test_invalid_utf8_text_frame_keeps_session() {
    // Arrange
    let (port, running, _server) = start(BridgeConfig::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("after-bad-frame.txt");
    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();

    // Act: a text frame whose payload is not UTF-8 sits between two commands.
    ws.send(Message::Text("append hello".into())).await.unwrap();
    let bad = Frame::message(vec![0xFF, 0xFE, 0x20, 0x41], OpCode::Data(Data::Text), true);
    ws.send(Message::Frame(bad)).await.unwrap();
    ws.send(Message::Text(format!("printToFile {}", path.display())))
        .await
        .unwrap();

    // Assert: the job assembled before the bad frame is still printed.
    let written = wait_for_len(&path, 5, Duration::from_secs(5)).await;
    assert_eq!(written.as_deref(), Some(&b"hello"[..]));

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_job_larger_than_default_frame_limit_is_accepted() {
    // Arrange: 20 MiB in one frame, over tungstenite's 16 MiB default.
    let (port, running, _server) = start(BridgeConfig::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.txt");
    let size = 20 * 1024 * 1024;
    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();

    // Act
    let mut command = String::with_capacity(size + 7);
    command.push_str("append ");
    command.extend(std::iter::repeat('A').take(size));
    ws.send(Message::Text(command)).await.unwrap();
    ws.send(Message::Text(format!("printToFile {}", path.display())))
        .await
        .unwrap();

    // Assert
    let written = wait_for_len(&path, size, Duration::from_secs(20)).await;
    assert!(written.is_some(), "the large job must reach the file");

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_configured_limit_rejects_larger_messages() {
    // Arrange: a 1 KiB limit; the oversized frame ends the session, so the
    // following command never runs.
    let config = BridgeConfig {
        max_message_size: 1024,
        ..BridgeConfig::default()
    };
    let (port, running, _server) = start(config).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.txt");
    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();

    // Act
    ws.send(Message::Text(format!("append {}", "A".repeat(4096))))
        .await
        .unwrap();
    let _ = ws
        .send(Message::Text(format!("printToFile {}", path.display())))
        .await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Assert
    assert!(!path.exists());

    running.store(false, Ordering::Relaxed);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_blocked_print_does_not_stall_other_connections() {
    // Arrange: writing to a FIFO blocks until someone opens it for reading.
    let (port, running, _server) = start(BridgeConfig::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("printer-fifo");
    let status = std::process::Command::new("mkfifo")
        .arg(&fifo)
        .status()
        .unwrap();
    assert!(status.success());

    let (mut first, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    first.send(Message::Text("append hello".into())).await.unwrap();
    first
        .send(Message::Text(format!("printToFile {}", fifo.display())))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Act: with one worker thread, a second page must still get through.
    let second = tokio::time::timeout(
        Duration::from_secs(2),
        connect_async(format!("ws://127.0.0.1:{port}")),
    )
    .await;

    // Assert
    assert!(
        matches!(second, Ok(Ok(_))),
        "second connection must complete while the first print is blocked"
    );

    let reader = fifo.clone();
    let received = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::task::spawn_blocking(move || std::fs::read(reader)),
    )
    .await
    .unwrap()
    .unwrap()
    .unwrap();
    assert_eq!(received, b"hello");

    running.store(false, Ordering::Relaxed);
}
