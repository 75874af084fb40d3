//! Application layer for printbridge-server.
//!
//! Turns command text into actions on a per-session print context.  No
//! sockets live here: the infrastructure layer feeds frames into a
//! [`Session`] and the session drives the core backends.
//!
//! ```text
//! frame text ──▶ Session ──▶ Command::parse ──▶ Dispatcher ──▶ Handler(PrintContext)
//!                                                                  │
//!                                                                  ▼
//!                                                       printbridge_core backends
//! ```

use thiserror::Error;

use printbridge_core::{BackendError, UnknownCharset};

pub mod dispatcher;
pub mod payload;
pub mod print_context;
pub mod session;

pub use dispatcher::{Dispatcher, Handler, Route};
pub use payload::{base64_decode, hex_decode};
pub use print_context::PrintContext;
pub use session::{Dispatch, Session};

/// Why a single command failed.  Sessions log these and carry on.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The payload could not be decoded (bad Base64 or hex).
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `print` was sent before any printer was selected.
    #[error("no printer selected")]
    NoPrinter,

    #[error(transparent)]
    Charset(#[from] UnknownCharset),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
