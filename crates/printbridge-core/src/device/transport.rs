//! The bus-facing half of the device layer.

use std::collections::HashMap;
use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, TransferType, UsbContext};
use tracing::{debug, warn};

use super::DeviceError;

/// Default timeout applied to every bulk/interrupt transfer.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Low-level operations a [`UsbChannel`](super::UsbChannel) needs from the bus.
///
/// `submit` is symmetric: for OUT endpoints `data` is sent, for IN endpoints
/// `data` is the pre-sized slot the device fills.  It returns the number of
/// bytes actually transferred.
#[cfg_attr(test, mockall::automock)]
pub trait UsbTransport: Send {
    fn claim_interface(&mut self, interface: u8) -> Result<(), DeviceError>;
    fn release_interface(&mut self, interface: u8) -> Result<(), DeviceError>;
    fn open_pipe(&mut self, endpoint: u8) -> Result<(), DeviceError>;
    fn submit(&mut self, endpoint: u8, data: &mut [u8]) -> Result<usize, DeviceError>;
    fn close_pipe(&mut self, endpoint: u8) -> Result<(), DeviceError>;
}

/// An open pipe: what the endpoint descriptor told us about it.
#[derive(Debug, Clone, Copy)]
struct Pipe {
    transfer_type: TransferType,
    direction: Direction,
}

/// [`UsbTransport`] backed by libusb through the `rusb` crate.
pub struct RusbTransport {
    handle: DeviceHandle<Context>,
    timeout: Duration,
    pipes: HashMap<u8, Pipe>,
    /// Interfaces whose kernel driver we detached and must reattach.
    detached: Vec<u8>,
}

impl RusbTransport {
    /// Opens the first attached device matching `vendor_id:product_id`.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] when no such device is attached, or
    /// [`DeviceError::Io`] when libusb cannot be initialised.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, DeviceError> {
        let context = Context::new()?;
        let handle = context
            .open_device_with_vid_pid(vendor_id, product_id)
            .ok_or(DeviceError::NotFound {
                vendor_id,
                product_id,
            })?;
        debug!("opened USB device {vendor_id:04x}:{product_id:04x}");
        Ok(Self::from_handle(handle))
    }

    /// Wraps an already opened device handle.
    pub fn from_handle(handle: DeviceHandle<Context>) -> Self {
        Self {
            handle,
            timeout: DEFAULT_TIMEOUT,
            pipes: HashMap::new(),
            detached: Vec::new(),
        }
    }

    /// Overrides the per-transfer timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn describe_endpoint(&self, endpoint: u8) -> Result<Pipe, DeviceError> {
        let config = self.handle.device().active_config_descriptor()?;
        config
            .interfaces()
            .flat_map(|interface| interface.descriptors())
            .flat_map(|descriptor| {
                descriptor
                    .endpoint_descriptors()
                    .map(|ep| (ep.address(), ep.transfer_type(), ep.direction()))
                    .collect::<Vec<_>>()
            })
            .find(|(address, _, _)| *address == endpoint)
            .map(|(_, transfer_type, direction)| Pipe {
                transfer_type,
                direction,
            })
            .ok_or(DeviceError::UnknownEndpoint { endpoint })
    }
}

impl UsbTransport for RusbTransport {
    fn claim_interface(&mut self, interface: u8) -> Result<(), DeviceError> {
        // Printer-class interfaces are usually bound to `usblp` on Linux.
        // libusb cannot claim them until that driver lets go.
        match self.handle.kernel_driver_active(interface) {
            Ok(true) => match self.handle.detach_kernel_driver(interface) {
                Ok(()) => self.detached.push(interface),
                Err(e) => warn!("failed to detach kernel driver from interface {interface}: {e}"),
            },
            Ok(false) => {}
            Err(e) => debug!("kernel driver state unknown for interface {interface}: {e}"),
        }

        self.handle
            .claim_interface(interface)
            .map_err(|e| match e {
                rusb::Error::Busy => DeviceError::Busy { interface },
                other => DeviceError::Io(other),
            })?;
        debug!("claimed USB interface {interface}");
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), DeviceError> {
        self.handle.release_interface(interface)?;
        debug!("released USB interface {interface}");

        if let Some(pos) = self.detached.iter().position(|i| *i == interface) {
            self.detached.swap_remove(pos);
            if let Err(e) = self.handle.attach_kernel_driver(interface) {
                debug!("could not reattach kernel driver to interface {interface}: {e}");
            }
        }
        Ok(())
    }

    fn open_pipe(&mut self, endpoint: u8) -> Result<(), DeviceError> {
        let pipe = self.describe_endpoint(endpoint)?;
        self.pipes.insert(endpoint, pipe);
        Ok(())
    }

    fn submit(&mut self, endpoint: u8, data: &mut [u8]) -> Result<usize, DeviceError> {
        let pipe = *self
            .pipes
            .get(&endpoint)
            .ok_or(DeviceError::UnknownEndpoint { endpoint })?;

        let transferred = match (pipe.transfer_type, pipe.direction) {
            (TransferType::Interrupt, Direction::In) => {
                self.handle.read_interrupt(endpoint, data, self.timeout)?
            }
            (TransferType::Interrupt, Direction::Out) => {
                self.handle.write_interrupt(endpoint, data, self.timeout)?
            }
            (_, Direction::In) => self.handle.read_bulk(endpoint, data, self.timeout)?,
            (_, Direction::Out) => self.handle.write_bulk(endpoint, data, self.timeout)?,
        };

        debug!(
            "USB transfer on endpoint {endpoint:#04x}: {transferred}/{} bytes",
            data.len()
        );
        Ok(transferred)
    }

    fn close_pipe(&mut self, endpoint: u8) -> Result<(), DeviceError> {
        self.pipes.remove(&endpoint);
        Ok(())
    }
}

impl<T: UsbTransport + ?Sized> UsbTransport for Box<T> {
    fn claim_interface(&mut self, interface: u8) -> Result<(), DeviceError> {
        (**self).claim_interface(interface)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), DeviceError> {
        (**self).release_interface(interface)
    }

    fn open_pipe(&mut self, endpoint: u8) -> Result<(), DeviceError> {
        (**self).open_pipe(endpoint)
    }

    fn submit(&mut self, endpoint: u8, data: &mut [u8]) -> Result<usize, DeviceError> {
        (**self).submit(endpoint, data)
    }

    fn close_pipe(&mut self, endpoint: u8) -> Result<(), DeviceError> {
        (**self).close_pipe(endpoint)
    }
}
