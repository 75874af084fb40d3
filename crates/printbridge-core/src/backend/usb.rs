//! The USB Printer: sends raw jobs straight to a device endpoint.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use super::{BackendError, BackendKind, OutputBackend};
use crate::buffer::ByteBuffer;
use crate::device::{DeviceError, RusbTransport, UsbChannel, UsbTransport};

/// Which device, interface and endpoint a USB Printer talks to.
///
/// Parses from `"<vid>:<pid> <interface> <endpoint>"`.  Vendor and product
/// ids are hexadecimal (as `lsusb` prints them); interface and endpoint
/// accept decimal or a `0x` prefix:
///
/// ```
/// use printbridge_core::backend::UsbTarget;
///
/// let target: UsbTarget = "04b8:0202 0 0x01".parse().unwrap();
/// assert_eq!(target.vendor_id, 0x04b8);
/// assert_eq!(target.endpoint, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbTarget {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub endpoint: u8,
}

impl fmt::Display for UsbTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} iface {} ep {:#04x}",
            self.vendor_id, self.product_id, self.interface, self.endpoint
        )
    }
}

impl FromStr for UsbTarget {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BackendError::InvalidTarget(format!("malformed USB target '{s}'"));

        let mut parts = s.split_whitespace();
        let (ids, interface, endpoint) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(ids), Some(interface), Some(endpoint), None) => (ids, interface, endpoint),
            _ => return Err(invalid()),
        };

        let (vid, pid) = ids.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            vendor_id: u16::from_str_radix(vid, 16).map_err(|_| invalid())?,
            product_id: u16::from_str_radix(pid, 16).map_err(|_| invalid())?,
            interface: parse_number(interface).ok_or_else(invalid)?,
            endpoint: parse_number(endpoint).ok_or_else(invalid)?,
        })
    }
}

fn parse_number(s: &str) -> Option<u8> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Writes jobs to an OUT endpoint through a [`UsbChannel`].
pub struct UsbPrinter {
    name: String,
    job_title: Option<String>,
    target: UsbTarget,
    channel: UsbChannel<Box<dyn UsbTransport>>,
    /// Cleared once the device reports it has been unplugged.
    attached: bool,
}

impl UsbPrinter {
    /// Finds the device named by `target` on the bus.
    ///
    /// # Errors
    ///
    /// [`BackendError::Device`] wrapping [`DeviceError::NotFound`] when the
    /// device is not attached.
    pub fn open(target: UsbTarget) -> Result<Self, BackendError> {
        let transport = RusbTransport::open(target.vendor_id, target.product_id)?;
        Ok(Self::with_transport(target, Box::new(transport)))
    }

    /// Builds a printer over an arbitrary transport.
    pub fn with_transport(target: UsbTarget, transport: Box<dyn UsbTransport>) -> Self {
        Self {
            name: format!("USB Printer {:04x}:{:04x}", target.vendor_id, target.product_id),
            job_title: None,
            target,
            channel: UsbChannel::new(transport),
            attached: true,
        }
    }

    pub fn target(&self) -> UsbTarget {
        self.target
    }

    fn send(&mut self, job: &ByteBuffer) -> Result<(), DeviceError> {
        if !self.channel.is_open() {
            self.channel.open(self.target.interface)?;
        }
        let bytes = job.materialize();
        self.channel.send_data(self.target.endpoint, &bytes)?;
        info!("sent {} bytes to {}", bytes.len(), self.target);
        Ok(())
    }
}

impl fmt::Debug for UsbPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbPrinter")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("claimed", &self.channel.claimed_interface())
            .finish()
    }
}

impl OutputBackend for UsbPrinter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn job_title(&self) -> Option<&str> {
        self.job_title.as_deref()
    }

    fn set_job_title(&mut self, title: String) {
        self.job_title = Some(title);
    }

    fn ready(&self) -> bool {
        self.attached
    }

    fn print_raw(&mut self, job: &ByteBuffer) -> Result<(), BackendError> {
        self.send(job).map_err(|e| {
            if matches!(e, DeviceError::Io(rusb::Error::NoDevice)) {
                self.attached = false;
            }
            BackendError::Device(e)
        })
    }

    fn print_alternate(&mut self, _job: &ByteBuffer) -> Result<(), BackendError> {
        warn!("alternate printing is not supported by the USB printer");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Usb
    }

    fn release(&mut self) {
        if self.channel.is_open() {
            if let Err(e) = self.channel.close() {
                warn!("failed to release {}: {e}", self.target);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::device::transport::MockUsbTransport;

    const TARGET: UsbTarget = UsbTarget {
        vendor_id: 0x0a5f,
        product_id: 0x0164,
        interface: 0,
        endpoint: 0x01,
    };

    #[test]
    fn test_target_parses_hex_and_decimal() {
        let target: UsbTarget = "0a5f:0164 1 129".parse().unwrap();
        assert_eq!(
            target,
            UsbTarget {
                vendor_id: 0x0a5f,
                product_id: 0x0164,
                interface: 1,
                endpoint: 0x81,
            }
        );
    }

    #[test]
    fn test_target_rejects_malformed_input() {
        for bad in ["", "0a5f:0164", "0a5f 0 1", "zzzz:0164 0 1", "0a5f:0164 0 1 extra", "0a5f:0164 0 0x1ff"] {
            assert!(
                matches!(bad.parse::<UsbTarget>(), Err(BackendError::InvalidTarget(_))),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_first_print_claims_then_reuses_claim() {
        // Arrange: exactly one claim across two jobs.
        let mut mock = MockUsbTransport::new();
        mock.expect_claim_interface().with(eq(0)).times(1).returning(|_| Ok(()));
        mock.expect_open_pipe().times(2).returning(|_| Ok(()));
        mock.expect_submit()
            .times(2)
            .returning(|_, data: &mut [u8]| Ok(data.len()));
        mock.expect_close_pipe().times(2).returning(|_| Ok(()));
        mock.expect_release_interface().times(1).returning(|_| Ok(()));
        let mut printer = UsbPrinter::with_transport(TARGET, Box::new(mock));

        // Act
        printer.print_raw(&ByteBuffer::from_bytes(&b"^XA"[..])).unwrap();
        printer.print_raw(&ByteBuffer::from_bytes(&b"^XZ"[..])).unwrap();
        printer.release();

        // Assert: mock expectations are verified on drop.
        assert_eq!(printer.kind(), BackendKind::Usb);
    }

    #[test]
    fn test_device_errors_propagate() {
        let mut mock = MockUsbTransport::new();
        mock.expect_claim_interface()
            .returning(|interface| Err(DeviceError::Busy { interface }));
        let mut printer = UsbPrinter::with_transport(TARGET, Box::new(mock));

        let result = printer.print_raw(&ByteBuffer::from_bytes(&b"x"[..]));

        assert!(matches!(
            result,
            Err(BackendError::Device(DeviceError::Busy { interface: 0 }))
        ));
        assert!(printer.ready());
    }

    #[test]
    fn test_unplugged_device_is_not_ready() {
        let mut mock = MockUsbTransport::new();
        mock.expect_claim_interface().returning(|_| Ok(()));
        mock.expect_open_pipe().returning(|_| Ok(()));
        mock.expect_submit()
            .returning(|_, _| Err(DeviceError::Io(rusb::Error::NoDevice)));
        mock.expect_close_pipe().returning(|_| Ok(()));
        mock.expect_release_interface().returning(|_| Ok(()));
        let mut printer = UsbPrinter::with_transport(TARGET, Box::new(mock));

        let result = printer.print_raw(&ByteBuffer::from_bytes(&b"x"[..]));

        assert!(result.is_err());
        assert!(!printer.ready());
    }

    #[test]
    fn test_release_without_claim_touches_nothing() {
        let mut printer = UsbPrinter::with_transport(TARGET, Box::new(MockUsbTransport::new()));
        printer.release();
    }
}
