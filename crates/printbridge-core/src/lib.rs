//! # printbridge-core
//!
//! Job assembly and output for the printbridge service.
//!
//! printbridge lets a web page send raw printer commands (ZPL, EPL, ESC/POS,
//! PostScript...) to a printer attached to the local machine.  The page
//! connects over a WebSocket, appends job data piece by piece, then asks for
//! the job to be printed.  This crate holds everything that does not care
//! about the WebSocket:
//!
//! - **`buffer`** – the [`ByteBuffer`] a job is assembled in, and the
//!   [`Charset`]s text can be appended in.
//!
//! - **`backend`** – where a finished job goes: an OS print queue, a file,
//!   the log, a USB endpoint, or a raw TCP socket on a network printer.
//!
//! - **`device`** – direct USB access for printers that have no OS queue:
//!   claim an interface, exchange data with an endpoint, release it.
//!
//! Backend calls block until the job has been handed off, so the server
//! runs them on tokio's blocking pool.  The one async entry point is
//! [`send_to_host`], which needs a tokio runtime to drive its socket.

pub mod backend;
pub mod buffer;
pub mod device;

pub use backend::{
    send_to_host, Backend, BackendError, BackendKind, BackendTarget, OutputBackend, UsbTarget,
};
pub use buffer::{ByteBuffer, Charset, UnknownCharset};
pub use device::{DeviceError, UsbChannel};
