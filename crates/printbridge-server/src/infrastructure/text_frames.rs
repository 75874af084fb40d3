//! Text-frame relabelling on the read side of a WebSocket connection.
//!
//! tungstenite validates UTF-8 inside the stream and treats a bad text
//! frame as fatal: once a read fails the stream is fused and the
//! connection is gone.  A page that sends one malformed command must not
//! lose its whole session, so [`TextFrames`] sits between the socket and
//! tungstenite and relabels every client text frame as binary.  The
//! session task then decodes the payload itself and can report a bad frame
//! through `on_error` while keeping the connection.
//!
//! For each data message the wrapper records whether it started life as
//! text, in arrival order, on an unbounded channel:
//!
//! ```text
//! socket ──▶ TextFrames ──(opcode 0x1 → 0x2)──▶ tungstenite ──▶ Message::Binary
//!                │                                                  │
//!                └──────────── origins: true / false ───────────────┘
//! ```
//!
//! The HTTP upgrade request is passed through untouched.  Writes are never
//! inspected.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

const HEADER_END: &[u8; 4] = b"\r\n\r\n";

const OPCODE_TEXT: u8 = 0x1;
const OPCODE_BINARY: u8 = 0x2;

/// Wraps `inner` and relabels incoming text frames as binary.
///
/// The receiver yields `true` for each data message that was sent as text
/// and `false` for each genuine binary message.
pub struct TextFrames<S> {
    inner: S,
    scanner: Scanner,
}

impl<S> TextFrames<S> {
    pub fn new(inner: S) -> (Self, UnboundedReceiver<bool>) {
        let (tx, rx) = unbounded_channel();
        let frames = Self {
            inner,
            scanner: Scanner::new(tx),
        };
        (frames, rx)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TextFrames<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let start = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.scanner.scan(&mut buf.filled_mut()[start..]);
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TextFrames<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, data)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

// ── Frame header scanner ──────────────────────────────────────────────────────

/// Where the scanner is in the byte stream.  Headers may be split across
/// reads, so every state is resumable one byte at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Inside the HTTP upgrade request; `matched` bytes of `\r\n\r\n` seen.
    Handshake { matched: usize },
    /// Next byte is FIN/RSV/opcode.
    FirstByte,
    /// Next byte is MASK/payload length.
    SecondByte,
    ExtLength { remaining: u8, len: u64, masked: bool },
    MaskKey { remaining: u8, len: u64 },
    Payload { remaining: u64 },
}

struct Scanner {
    state: ScanState,
    origins: UnboundedSender<bool>,
}

impl Scanner {
    fn new(origins: UnboundedSender<bool>) -> Self {
        Self {
            state: ScanState::Handshake { matched: 0 },
            origins,
        }
    }

    fn scan(&mut self, bytes: &mut [u8]) {
        let mut i = 0;
        while i < bytes.len() {
            self.state = match self.state {
                ScanState::Handshake { matched } => {
                    let byte = bytes[i];
                    i += 1;
                    let matched = if byte == HEADER_END[matched] {
                        matched + 1
                    } else if byte == b'\r' {
                        1
                    } else {
                        0
                    };
                    if matched == HEADER_END.len() {
                        ScanState::FirstByte
                    } else {
                        ScanState::Handshake { matched }
                    }
                }
                ScanState::FirstByte => {
                    match bytes[i] & 0x0F {
                        OPCODE_TEXT => {
                            bytes[i] = (bytes[i] & 0xF0) | OPCODE_BINARY;
                            self.record(true);
                        }
                        OPCODE_BINARY => self.record(false),
                        _ => {}
                    }
                    i += 1;
                    ScanState::SecondByte
                }
                ScanState::SecondByte => {
                    let byte = bytes[i];
                    i += 1;
                    let masked = byte & 0x80 != 0;
                    match byte & 0x7F {
                        126 => ScanState::ExtLength { remaining: 2, len: 0, masked },
                        127 => ScanState::ExtLength { remaining: 8, len: 0, masked },
                        len => after_length(u64::from(len), masked),
                    }
                }
                ScanState::ExtLength {
                    remaining,
                    len,
                    masked,
                } => {
                    let len = (len << 8) | u64::from(bytes[i]);
                    i += 1;
                    if remaining == 1 {
                        after_length(len, masked)
                    } else {
                        ScanState::ExtLength {
                            remaining: remaining - 1,
                            len,
                            masked,
                        }
                    }
                }
                ScanState::MaskKey { remaining, len } => {
                    i += 1;
                    if remaining == 1 {
                        payload(len)
                    } else {
                        ScanState::MaskKey {
                            remaining: remaining - 1,
                            len,
                        }
                    }
                }
                ScanState::Payload { remaining } => {
                    let available = (bytes.len() - i) as u64;
                    let skip = remaining.min(available);
                    // `skip` never exceeds the slice length.
                    i += skip as usize;
                    payload(remaining - skip)
                }
            };
        }
    }

    fn record(&self, was_text: bool) {
        // The session may already be gone; nothing to tell then.
        let _ = self.origins.send(was_text);
    }
}

fn after_length(len: u64, masked: bool) -> ScanState {
    if masked {
        ScanState::MaskKey { remaining: 4, len }
    } else {
        payload(len)
    }
}

fn payload(len: u64) -> ScanState {
    if len == 0 {
        ScanState::FirstByte
    } else {
        ScanState::Payload { remaining: len }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    const UPGRADE: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\n\r\n";

    /// A masked client frame with the given opcode and payload.
    fn client_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x80 | opcode];
        match payload.len() {
            len @ 0..=125 => frame.push(0x80 | len as u8),
            len @ 126..=0xFFFF => {
                frame.push(0x80 | 126);
                frame.extend_from_slice(&(len as u16).to_be_bytes());
            }
            len => {
                frame.push(0x80 | 127);
                frame.extend_from_slice(&(len as u64).to_be_bytes());
            }
        }
        // An all-zero key leaves the payload readable.
        frame.extend_from_slice(&[0, 0, 0, 0]);
        frame.extend_from_slice(payload);
        frame
    }

    fn scanner() -> (Scanner, UnboundedReceiver<bool>) {
        let (tx, rx) = unbounded_channel();
        (Scanner::new(tx), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<bool>) -> Vec<bool> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_text_frame_is_relabelled_binary() {
        // Arrange
        let (mut scanner, mut rx) = scanner();
        let mut bytes = UPGRADE.to_vec();
        let header_at = bytes.len();
        bytes.extend(client_frame(OPCODE_TEXT, b"append hi"));

        // Act
        scanner.scan(&mut bytes);

        // Assert
        assert_eq!(&bytes[..header_at], UPGRADE);
        assert_eq!(bytes[header_at], 0x80 | OPCODE_BINARY);
        assert_eq!(&bytes[header_at + 6..], b"append hi");
        assert_eq!(drain(&mut rx), vec![true]);
    }

    #[test]
    fn test_handshake_bytes_are_untouched() {
        // "\x81" inside the request must not be taken for a frame header.
        let (mut scanner, mut rx) = scanner();
        let mut bytes = b"GET /\x81 HTTP/1.1\r\nHost: x\r\n".to_vec();
        let original = bytes.clone();

        scanner.scan(&mut bytes);

        assert_eq!(bytes, original);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(scanner.state, ScanState::Handshake { matched: 2 });
    }

    #[test]
    fn test_binary_and_control_frames_pass_through() {
        let (mut scanner, mut rx) = scanner();
        let mut bytes = UPGRADE.to_vec();
        bytes.extend(client_frame(OPCODE_BINARY, &[0x01, 0x81]));
        bytes.extend(client_frame(0x9, b"ping"));
        bytes.extend(client_frame(OPCODE_TEXT, b"x"));
        let original = bytes.clone();

        scanner.scan(&mut bytes);

        let third = UPGRADE.len() + 8 + 10;
        assert_eq!(&bytes[..third], &original[..third]);
        assert_eq!(bytes[third], 0x80 | OPCODE_BINARY);
        assert_eq!(drain(&mut rx), vec![false, true]);
    }

    #[test]
    fn test_header_split_across_reads() {
        // Arrange: a 300-byte text frame uses the 16-bit length form.
        let (mut scanner, mut rx) = scanner();
        let payload = vec![b'A'; 300];
        let mut bytes = UPGRADE.to_vec();
        let header_at = bytes.len();
        bytes.extend(client_frame(OPCODE_TEXT, &payload));
        bytes.extend(client_frame(OPCODE_TEXT, b"next"));

        // Act: feed one byte at a time.
        for i in 0..bytes.len() {
            scanner.scan(&mut bytes[i..i + 1]);
        }

        // Assert
        assert_eq!(bytes[header_at], 0x80 | OPCODE_BINARY);
        let second_at = header_at + 2 + 2 + 4 + 300;
        assert_eq!(bytes[second_at], 0x80 | OPCODE_BINARY);
        assert_eq!(drain(&mut rx), vec![true, true]);
        assert_eq!(scanner.state, ScanState::FirstByte);
    }

    #[test]
    fn test_continuation_frames_record_nothing() {
        let (mut scanner, mut rx) = scanner();
        let mut bytes = UPGRADE.to_vec();
        let mut first = client_frame(OPCODE_TEXT, b"app");
        first[0] &= 0x7F;
        bytes.extend(first);
        bytes.extend(client_frame(0x0, b"end x"));

        scanner.scan(&mut bytes);

        assert_eq!(drain(&mut rx), vec![true]);
    }

    #[tokio::test]
    async fn test_wrapper_rewrites_while_reading_and_writes_through() {
        // Arrange
        let (client, server) = tokio::io::duplex(1024);
        let (mut frames, mut rx) = TextFrames::new(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let mut sent = UPGRADE.to_vec();
        sent.extend(client_frame(OPCODE_TEXT, b"qzReady"));
        client_write.write_all(&sent).await.unwrap();

        // Act
        let mut received = vec![0; sent.len()];
        frames.read_exact(&mut received).await.unwrap();
        frames.write_all(b"reply").await.unwrap();
        let mut echoed = [0; 5];
        client_read.read_exact(&mut echoed).await.unwrap();

        // Assert
        assert_eq!(received[UPGRADE.len()], 0x80 | OPCODE_BINARY);
        assert_eq!(rx.try_recv().ok(), Some(true));
        assert_eq!(&echoed, b"reply");
    }
}
