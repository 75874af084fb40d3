//! Output backends: where a finished job goes.
//!
//! Every backend implements the same [`OutputBackend`] capability set, and
//! [`Backend`] closes the set of variants:
//!
//! | Variant                  | Tag      | Target                                  |
//! |--------------------------|----------|-----------------------------------------|
//! | [`SystemPrinter`]        | `SYSTEM` | an OS print queue (via `lp`)            |
//! | [`FilePrinter`]          | `FILE`   | a path on disk, extension-checked       |
//! | [`DebugSink`]            | `DEBUG`  | the log                                 |
//! | [`UsbPrinter`]           | `USB`    | an OUT endpoint on a claimed interface  |
//!
//! The variant is always picked explicitly through [`BackendTarget`]; nothing
//! downcasts a backend to find out what it is.
//!
//! # Error policy
//!
//! Path validation ([`FilePrinter::set_output_path`]) returns a typed
//! [`BackendError`] the caller handles locally.  USB failures propagate as
//! [`BackendError::Device`].  The session layer logs all of them; none is
//! fatal.

use std::fmt;

use thiserror::Error;

use crate::buffer::ByteBuffer;
use crate::device::DeviceError;

pub mod debug;
pub mod denylist;
pub mod file;
pub mod host;
pub mod system;
pub mod usb;

pub use debug::DebugSink;
pub use file::FilePrinter;
pub use host::{send_to_host, DEFAULT_RAW_PORT};
pub use system::SystemPrinter;
pub use usb::{UsbPrinter, UsbTarget};

/// Errors produced by output backends.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The output target is not allowed or not configured (e.g. a denied
    /// file extension, or no output path set).
    #[error("invalid output target: {0}")]
    InvalidTarget(String),

    /// The job data could not be interpreted.
    #[error("invalid job payload: {0}")]
    InvalidPayload(String),

    /// The OS print system or remote host rejected the job.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A USB transfer failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Short tag identifying a backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    System,
    File,
    Debug,
    Usb,
}

impl BackendKind {
    /// The upper-case tag exposed to clients and logs.
    pub fn tag(self) -> &'static str {
        match self {
            BackendKind::System => "SYSTEM",
            BackendKind::File => "FILE",
            BackendKind::Debug => "DEBUG",
            BackendKind::Usb => "USB",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The capability set shared by all output backends.
pub trait OutputBackend {
    /// Human-readable label.
    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    /// Title applied to the next job, where the target supports one.
    fn job_title(&self) -> Option<&str>;

    fn set_job_title(&mut self, title: String);

    /// `true` if the backend can accept a job right now.
    fn ready(&self) -> bool;

    /// Sends the materialized job bytes as the literal job content.
    fn print_raw(&mut self, job: &ByteBuffer) -> Result<(), BackendError>;

    /// Sends the job through the backend's alternate submission path.
    ///
    /// Backends without one log a warning and return `Ok(())`.
    fn print_alternate(&mut self, job: &ByteBuffer) -> Result<(), BackendError>;

    fn kind(&self) -> BackendKind;

    /// The OS queue this backend submits to.  Only system printers have one.
    fn print_queue(&self) -> Option<&str> {
        None
    }

    /// Frees any OS or device resource held between jobs.
    fn release(&mut self) {}
}

/// Which backend to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    /// An OS print queue; `None` means the system default queue.
    System { queue: Option<String> },
    File,
    Debug,
    Usb(UsbTarget),
}

/// One output backend of any kind.
pub enum Backend {
    System(SystemPrinter),
    File(FilePrinter),
    Debug(DebugSink),
    Usb(UsbPrinter),
}

impl Backend {
    /// Builds the backend variant named by `target`.
    ///
    /// # Errors
    ///
    /// Only USB targets can fail here, when the device is not attached or
    /// libusb cannot be initialised.
    pub fn new(target: BackendTarget) -> Result<Self, BackendError> {
        Ok(match target {
            BackendTarget::System { queue } => Backend::System(SystemPrinter::new(queue)),
            BackendTarget::File => Backend::File(FilePrinter::new()),
            BackendTarget::Debug => Backend::Debug(DebugSink::new()),
            BackendTarget::Usb(usb) => Backend::Usb(UsbPrinter::open(usb)?),
        })
    }

    /// Borrows the File Printer, if that is the variant.
    pub fn as_file_mut(&mut self) -> Option<&mut FilePrinter> {
        match self {
            Backend::File(printer) => Some(printer),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn OutputBackend {
        match self {
            Backend::System(b) => b,
            Backend::File(b) => b,
            Backend::Debug(b) => b,
            Backend::Usb(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn OutputBackend {
        match self {
            Backend::System(b) => b,
            Backend::File(b) => b,
            Backend::Debug(b) => b,
            Backend::Usb(b) => b,
        }
    }
}

impl OutputBackend for Backend {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn set_name(&mut self, name: String) {
        self.inner_mut().set_name(name);
    }

    fn job_title(&self) -> Option<&str> {
        self.inner().job_title()
    }

    fn set_job_title(&mut self, title: String) {
        self.inner_mut().set_job_title(title);
    }

    fn ready(&self) -> bool {
        self.inner().ready()
    }

    fn print_raw(&mut self, job: &ByteBuffer) -> Result<(), BackendError> {
        self.inner_mut().print_raw(job)
    }

    fn print_alternate(&mut self, job: &ByteBuffer) -> Result<(), BackendError> {
        self.inner_mut().print_alternate(job)
    }

    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }

    fn print_queue(&self) -> Option<&str> {
        self.inner().print_queue()
    }

    fn release(&mut self) {
        self.inner_mut().release();
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
