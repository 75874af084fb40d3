//! Append-only chunked byte buffer.
//!
//! # Why not just a `Vec<u8>`?
//!
//! Raw print jobs are assembled from many appends, some of them large
//! (decoded Base64 images, whole label templates).  Pushing every fragment
//! into a single growing `Vec` copies the existing contents on each
//! reallocation.  Instead we keep each fragment as its own [`Bytes`] chunk
//! and only concatenate once, when a backend asks for the payload.
//!
//! The concatenated form is cached in a [`OnceCell`], so calling
//! [`ByteBuffer::materialize`] repeatedly between appends costs one
//! reference-count bump, not one copy.
//!
//! # Thread safety
//!
//! `ByteBuffer` is `Send` but not `Sync`: the cache cell has no
//! locking.  One job buffer belongs to one session task.

use std::cell::OnceCell;

use bytes::{Bytes, BytesMut};

use super::charset::Charset;

/// Default number of chunk slots reserved by [`ByteBuffer::new`].
const DEFAULT_CHUNK_CAPACITY: usize = 10;

/// An ordered list of byte chunks with an O(1) total length and a lazily
/// computed contiguous form.
///
/// # Example
///
/// ```rust
/// use printbridge_core::buffer::ByteBuffer;
///
/// let mut buf = ByteBuffer::new();
/// buf.append(&b"^XA"[..]).append(&b"^XZ"[..]);
/// assert_eq!(buf.len(), 6);
/// assert_eq!(&buf.materialize()[..], b"^XA^XZ");
/// ```
#[derive(Debug)]
pub struct ByteBuffer {
    chunks: Vec<Bytes>,
    len: usize,
    contents: OnceCell<Bytes>,
}

impl ByteBuffer {
    /// Creates an empty buffer with room for 10 chunks.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHUNK_CAPACITY)
    }

    /// Creates an empty buffer with room for `chunk_capacity` chunks before
    /// the chunk list reallocates.
    ///
    /// The hint counts chunks, not bytes: chunk payloads are never copied
    /// into a shared allocation until [`materialize`](Self::materialize).
    pub fn with_capacity(chunk_capacity: usize) -> Self {
        Self {
            chunks: Vec::with_capacity(chunk_capacity),
            len: 0,
            contents: OnceCell::new(),
        }
    }

    /// Creates a buffer pre-seeded with `initial`.
    pub fn from_bytes(initial: impl Into<Bytes>) -> Self {
        let mut buf = Self::new();
        buf.append(initial);
        buf
    }

    /// Creates a buffer with a chunk-capacity hint, pre-seeded with `initial`.
    pub fn from_bytes_with_capacity(initial: impl Into<Bytes>, chunk_capacity: usize) -> Self {
        let mut buf = Self::with_capacity(chunk_capacity);
        buf.append(initial);
        buf
    }

    /// Appends one chunk and invalidates the cached contiguous form.
    ///
    /// Empty chunks are accepted and contribute nothing to the length.
    /// Returns `&mut Self` so appends can be chained.
    pub fn append(&mut self, chunk: impl Into<Bytes>) -> &mut Self {
        let chunk = chunk.into();
        self.contents.take();
        self.len += chunk.len();
        self.chunks.push(chunk);
        self
    }

    /// Copies a borrowed slice into a new chunk and appends it.
    pub fn append_slice(&mut self, chunk: &[u8]) -> &mut Self {
        self.append(Bytes::copy_from_slice(chunk))
    }

    /// Encodes `text` with `charset` and appends the result.
    ///
    /// Characters the charset cannot represent are written as `?`.
    pub fn append_text(&mut self, text: &str, charset: Charset) -> &mut Self {
        self.append(charset.encode(text))
    }

    /// Total number of bytes across all chunks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no bytes have been appended since the last clear.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks currently held.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Discards every chunk and the cached contents.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
        self.contents.take();
    }

    /// Returns the concatenation of all chunks in append order.
    ///
    /// The first call after a mutation builds the contiguous form; later
    /// calls return a handle to the same allocation until the next
    /// [`append`](Self::append) or [`clear`](Self::clear).
    pub fn materialize(&self) -> Bytes {
        self.contents
            .get_or_init(|| match self.chunks.as_slice() {
                [] => Bytes::new(),
                // A single chunk already is the contiguous form.
                [only] => only.clone(),
                chunks => {
                    let mut out = BytesMut::with_capacity(self.len);
                    for chunk in chunks {
                        out.extend_from_slice(chunk);
                    }
                    out.freeze()
                }
            })
            .clone()
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
