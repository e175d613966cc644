//! Device handle: one open channel plus its enablement state.
//!
//! The handle is the only place that talks to a `RegisterTransport`. It
//! enforces the enablement rule (no transaction reaches the channel unless the
//! device was opened AND identified) and turns transport I/O errors into
//! `HalError::TransactionFailed` carrying the register name.

use cio_common::hal::error::{Access, HalError, IndexKind};
use cio_common::hal::regs::{Register, RegisterWidth};
use cio_common::hal::transport::{Payload, RegisterTransport};
use cio_common::hal::types::FirmwareIdentity;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Open communication channel to the controller hardware.
pub struct DeviceHandle {
    /// Underlying transport
    transport: Box<dyn RegisterTransport>,
    /// Device path passed to `open()`
    path: PathBuf,
    /// Channel open
    open: bool,
    /// Channel open AND identification succeeded
    enabled: bool,
    /// Identity read at initialization
    identity: Option<FirmwareIdentity>,
}

impl DeviceHandle {
    /// Wrap a closed transport for `path`.
    pub fn new(transport: Box<dyn RegisterTransport>, path: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            path: path.into(),
            open: false,
            enabled: false,
            identity: None,
        }
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transport backend name.
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Returns `true` while the channel is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns `true` once the channel is open and identified.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Identity read by [`identify`](Self::identify), if any.
    pub fn identity(&self) -> Option<FirmwareIdentity> {
        self.identity
    }

    /// Open the channel.
    ///
    /// # Errors
    /// `HalError::OpenFailed` if the transport cannot open the path; the
    /// handle stays disabled.
    pub fn open(&mut self) -> Result<(), HalError> {
        if self.open {
            return Ok(());
        }
        self.transport.open(&self.path).map_err(|e| {
            warn!("Failed to open controller channel {:?}: {}", self.path, e);
            HalError::OpenFailed {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        self.open = true;
        debug!("Controller channel {:?} open", self.path);
        Ok(())
    }

    /// Read the version register and enable the device.
    ///
    /// # Errors
    /// `HalError::NotEnabled` if the channel is not open,
    /// `HalError::TransactionFailed` if the version read fails.
    pub fn identify(&mut self) -> Result<FirmwareIdentity, HalError> {
        if !self.open {
            return Err(HalError::NotEnabled);
        }
        let payload = self.transact_read(Register::Version, 0)?;
        let raw = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let identity = FirmwareIdentity::from_register(raw);

        self.identity = Some(identity);
        self.enabled = true;
        info!("Controller identified: {} (version register {:#010x})", identity, raw);
        Ok(identity)
    }

    /// Close the channel. The device is disabled whether or not the close
    /// succeeds. Closing a closed handle is a no-op.
    ///
    /// # Errors
    /// `HalError::CloseFailed` if the transport reports an OS-level failure.
    pub fn close(&mut self) -> Result<(), HalError> {
        self.enabled = false;
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.transport.close().map_err(|e| {
            warn!("Failed to close controller channel {:?}: {}", self.path, e);
            HalError::CloseFailed(e.to_string())
        })?;
        info!("Controller channel {:?} closed", self.path);
        Ok(())
    }

    /// Read a register.
    pub fn read(&mut self, register: Register) -> Result<Payload, HalError> {
        self.read_at(register, 0)
    }

    /// Read a register at `offset` bytes past its address.
    pub fn read_at(&mut self, register: Register, offset: u16) -> Result<Payload, HalError> {
        self.ensure_enabled()?;
        self.transact_read(register, offset)
    }

    /// Read a 1-byte register.
    ///
    /// Wider registers are rejected with `InvalidIndex(ByteRegister)` before
    /// any transaction.
    pub fn read_u8(&mut self, register: Register) -> Result<u8, HalError> {
        self.ensure_enabled()?;
        ensure_byte_wide(register)?;
        Ok(self.read(register)?[0])
    }

    /// Write a register.
    pub fn write(&mut self, register: Register, data: &[u8]) -> Result<(), HalError> {
        self.write_at(register, 0, data)
    }

    /// Write a register at `offset` bytes past its address.
    pub fn write_at(&mut self, register: Register, offset: u16, data: &[u8]) -> Result<(), HalError> {
        self.ensure_enabled()?;
        let address = register.address().wrapping_add(offset);
        self.transport
            .write(address, register.width(), data)
            .map_err(|e| transaction_failed(register, Access::Write, e))
    }

    /// Write a 1-byte register.
    pub fn write_u8(&mut self, register: Register, value: u8) -> Result<(), HalError> {
        self.ensure_enabled()?;
        ensure_byte_wide(register)?;
        self.write(register, &[value])
    }

    fn ensure_enabled(&self) -> Result<(), HalError> {
        if self.enabled {
            Ok(())
        } else {
            Err(HalError::NotEnabled)
        }
    }

    fn transact_read(&mut self, register: Register, offset: u16) -> Result<Payload, HalError> {
        let address = register.address().wrapping_add(offset);
        let width = register.width();
        let payload = self
            .transport
            .read(address, width)
            .map_err(|e| transaction_failed(register, Access::Read, e))?;

        if payload.len() != width.bytes() {
            let e = std::io::Error::other(format!(
                "short transfer: {} of {} bytes",
                payload.len(),
                width.bytes()
            ));
            return Err(transaction_failed(register, Access::Read, e));
        }
        Ok(payload)
    }
}

fn ensure_byte_wide(register: Register) -> Result<(), HalError> {
    if register.width() == RegisterWidth::Byte {
        Ok(())
    } else {
        Err(HalError::invalid_index(
            IndexKind::ByteRegister,
            usize::from(register.address()),
        ))
    }
}

fn transaction_failed(register: Register, access: Access, e: std::io::Error) -> HalError {
    warn!("Register {} {} failed: {}", register, access, e);
    HalError::TransactionFailed {
        register: register.name(),
        access,
        reason: e.to_string(),
    }
}
