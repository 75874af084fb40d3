//! Interface claim and endpoint exchange on one USB device.

use tracing::{debug, warn};

use super::transport::{RusbTransport, UsbTransport};
use super::DeviceError;

/// A claimable channel to one USB device.
///
/// ```text
///   Closed ──open(iface)──▶ Opened ──close()──▶ Closed
///                             │
///                             └── exchange / send_data / read_data
/// ```
///
/// All methods take `&mut self`, so concurrent exchanges on one channel are
/// ruled out by the borrow checker; callers sharing a channel across tasks
/// wrap it in a mutex.
pub struct UsbChannel<T: UsbTransport = RusbTransport> {
    transport: T,
    claimed: Option<u8>,
}

impl UsbChannel<RusbTransport> {
    /// Locates a device by vendor/product id and wraps it in a closed channel.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if no matching device is attached.
    pub fn find(vendor_id: u16, product_id: u16) -> Result<Self, DeviceError> {
        Ok(Self::new(RusbTransport::open(vendor_id, product_id)?))
    }
}

impl<T: UsbTransport> UsbChannel<T> {
    /// Wraps a transport for an already identified device.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            claimed: None,
        }
    }

    /// Claims `interface`.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Busy`] if this channel already holds a claim (call
    /// [`close`](Self::close) first) or the OS reports the interface busy.
    pub fn open(&mut self, interface: u8) -> Result<(), DeviceError> {
        if let Some(current) = self.claimed {
            return Err(DeviceError::Busy { interface: current });
        }
        self.transport.claim_interface(interface)?;
        self.claimed = Some(interface);
        Ok(())
    }

    /// `true` while an interface is claimed.
    pub fn is_open(&self) -> bool {
        self.claimed.is_some()
    }

    /// The claimed interface number, if any.
    pub fn claimed_interface(&self) -> Option<u8> {
        self.claimed
    }

    /// Performs one synchronous transfer on `endpoint`.
    ///
    /// The pipe is opened for this single submit and closed again on every
    /// exit path, including a failed submit.  Returns the number of bytes
    /// transferred.
    pub fn exchange(&mut self, endpoint: u8, data: &mut [u8]) -> Result<usize, DeviceError> {
        if self.claimed.is_none() {
            return Err(DeviceError::NotOpen);
        }

        self.transport.open_pipe(endpoint)?;
        let mut pipe = PipeGuard {
            transport: &mut self.transport,
            endpoint,
        };
        pipe.transport.submit(endpoint, data)
    }

    /// Sends `data` to an OUT endpoint.
    pub fn send_data(&mut self, endpoint: u8, data: &[u8]) -> Result<(), DeviceError> {
        let mut out = data.to_vec();
        let sent = self.exchange(endpoint, &mut out)?;
        if sent < out.len() {
            warn!(
                "short USB write on endpoint {endpoint:#04x}: {sent}/{} bytes",
                out.len()
            );
        }
        Ok(())
    }

    /// Reads up to `response_size` bytes from an IN endpoint.
    pub fn read_data(&mut self, endpoint: u8, response_size: usize) -> Result<Vec<u8>, DeviceError> {
        let mut response = vec![0u8; response_size];
        let received = self.exchange(endpoint, &mut response)?;
        response.truncate(received);
        Ok(response)
    }

    /// Releases the claimed interface.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotOpen`] when nothing is claimed.
    pub fn close(&mut self) -> Result<(), DeviceError> {
        let interface = self.claimed.take().ok_or(DeviceError::NotOpen)?;
        self.transport.release_interface(interface)
    }
}

impl<T: UsbTransport> Drop for UsbChannel<T> {
    fn drop(&mut self) {
        if let Some(interface) = self.claimed.take() {
            if let Err(e) = self.transport.release_interface(interface) {
                warn!("failed to release USB interface {interface} on drop: {e}");
            }
        }
    }
}

/// Closes the transfer pipe when dropped.
struct PipeGuard<'a, T: UsbTransport> {
    transport: &'a mut T,
    endpoint: u8,
}

impl<T: UsbTransport> Drop for PipeGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.close_pipe(self.endpoint) {
            warn!("failed to close pipe on endpoint {:#04x}: {e}", self.endpoint);
        } else {
            debug!("closed pipe on endpoint {:#04x}", self.endpoint);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
