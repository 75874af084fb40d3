//! Job payload buffering.
//!
//! A print job arrives as many small fragments (one per `append*` command).
//! [`ByteBuffer`] collects them without copying and hands out one contiguous
//! view when a backend needs the whole payload.

pub mod byte_buffer;
pub mod charset;

pub use byte_buffer::ByteBuffer;
pub use charset::{Charset, UnknownCharset};
