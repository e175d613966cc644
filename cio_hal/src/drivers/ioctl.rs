//! Linux character-device transport.
//!
//! The controller driver exposes one ioctl per transaction direction. Both
//! carry the same `#[repr(C)]` request: register address, payload width and a
//! 16-byte payload buffer that the kernel fills (read) or consumes (write).

use cio_common::consts::MAX_PAYLOAD_BYTES;
use cio_common::hal::regs::RegisterWidth;
use cio_common::hal::transport::{Payload, RegisterTransport, payload_from};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::path::Path;
use tracing::debug;

/// ioctl type byte of the controller driver.
pub const CIO_IOC_MAGIC: u8 = b'c';
/// ioctl number of the register read transaction.
pub const CIO_IOC_READ: u8 = 0x01;
/// ioctl number of the register write transaction.
pub const CIO_IOC_WRITE: u8 = 0x02;

/// Transaction request shared with the kernel driver.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRegisterRequest {
    /// Register address
    pub address: u32,
    /// Payload width in bytes (1, 2, 4 or 16)
    pub width: u32,
    /// Payload buffer, only the first `width` bytes are meaningful
    pub data: [u8; MAX_PAYLOAD_BYTES],
}

impl RawRegisterRequest {
    fn new(address: u16, width: RegisterWidth) -> Self {
        Self {
            address: u32::from(address),
            width: width.bytes() as u32,
            data: [0; MAX_PAYLOAD_BYTES],
        }
    }
}

nix::ioctl_readwrite!(
    /// Read one register into the request buffer.
    cio_read_register,
    CIO_IOC_MAGIC,
    CIO_IOC_READ,
    RawRegisterRequest
);
nix::ioctl_write_ptr!(
    /// Write the request buffer to one register.
    cio_write_register,
    CIO_IOC_MAGIC,
    CIO_IOC_WRITE,
    RawRegisterRequest
);

/// Transport over the controller's character device.
#[derive(Debug, Default)]
pub struct IoctlTransport {
    file: Option<File>,
}

impl IoctlTransport {
    /// Create a closed transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn raw_fd(&self) -> io::Result<i32> {
        self.file
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "channel not open"))
    }
}

impl RegisterTransport for IoctlTransport {
    fn name(&self) -> &'static str {
        "ioctl"
    }

    fn open(&mut self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("Opened controller channel {:?}", path);
        self.file = Some(file);
        Ok(())
    }

    fn read(&mut self, address: u16, width: RegisterWidth) -> io::Result<Payload> {
        let fd = self.raw_fd()?;
        let mut request = RawRegisterRequest::new(address, width);

        // SAFETY: fd is an open controller channel and `request` is a valid,
        // exclusively borrowed request whose layout matches the driver ABI.
        unsafe { cio_read_register(fd, &mut request) }.map_err(io::Error::from)?;

        if RegisterWidth::from_bytes(request.width as usize) != Some(width) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("driver returned {} bytes for a {} register", request.width, width),
            ));
        }
        payload_from(&request.data[..width.bytes()])
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "payload overflow"))
    }

    fn write(&mut self, address: u16, width: RegisterWidth, data: &[u8]) -> io::Result<()> {
        if data.len() != width.bytes() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("payload is {} bytes, register is {}", data.len(), width),
            ));
        }
        let fd = self.raw_fd()?;
        let mut request = RawRegisterRequest::new(address, width);
        request.data[..data.len()].copy_from_slice(data);

        // SAFETY: fd is an open controller channel and `request` outlives the call.
        unsafe { cio_write_register(fd, &request) }.map_err(io::Error::from)?;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let fd = file.into_raw_fd();

        // SAFETY: `fd` was just released from its owning `File`, so it is
        // closed exactly once here.
        if unsafe { libc::close(fd) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout_matches_driver_abi() {
        assert_eq!(std::mem::size_of::<RawRegisterRequest>(), 24);
        let request = RawRegisterRequest::new(0x180, RegisterWidth::Block);
        assert_eq!(request.address, 0x180);
        assert_eq!(request.width, 16);
    }

    #[test]
    fn open_missing_device_fails() {
        let mut transport = IoctlTransport::new();
        assert!(transport.open(Path::new("/nonexistent/cio0")).is_err());
        assert!(transport.file.is_none());
    }

    #[test]
    fn transactions_on_closed_channel_fail() {
        let mut transport = IoctlTransport::new();
        let err = transport.read(0x10, RegisterWidth::Byte).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(transport.write(0x12, RegisterWidth::Byte, &[1]).is_err());
        assert!(transport.close().is_ok());
    }

    #[test]
    fn write_rejects_mismatched_width() {
        let mut transport = IoctlTransport::new();
        let err = transport
            .write(0x12, RegisterWidth::Byte, &[1, 2])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
