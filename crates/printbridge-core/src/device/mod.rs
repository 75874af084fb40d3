//! Raw USB device I/O.
//!
//! Label and receipt printers frequently sit on USB without an OS print
//! queue.  This module talks to them directly:
//!
//! ```text
//! UsbChannel  ── claim / exchange / release ──▶  UsbTransport
//!                                                  ├── RusbTransport (libusb via rusb)
//!                                                  └── test doubles
//! ```
//!
//! [`UsbChannel`] owns the Closed → Opened → Closed state machine and the
//! "pipe is always closed after a transfer" rule.  [`UsbTransport`] is the
//! seam to the actual bus, which keeps the channel testable without hardware.

use thiserror::Error;

pub mod channel;
pub mod transport;

pub use channel::UsbChannel;
pub use transport::{RusbTransport, UsbTransport};

/// Failures raised by the device layer.
///
/// Unlike backend errors these are always propagated to the caller, who
/// decides whether to retry or give up on the job.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No device with the requested vendor/product id is attached.
    #[error("USB device {vendor_id:04x}:{product_id:04x} not found")]
    NotFound { vendor_id: u16, product_id: u16 },

    /// The interface is already claimed, either by this channel or by
    /// another process / kernel driver.
    #[error("USB interface {interface} is busy")]
    Busy { interface: u8 },

    /// A transfer or release was attempted without a claimed interface.
    #[error("no USB interface is claimed")]
    NotOpen,

    /// The endpoint address does not exist on the active configuration.
    #[error("endpoint {endpoint:#04x} not found on the active configuration")]
    UnknownEndpoint { endpoint: u8 },

    /// Any transport failure: unplugged device, stall, timeout...
    #[error("USB I/O error: {0}")]
    Io(#[from] rusb::Error),
}
