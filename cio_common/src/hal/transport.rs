//! Register transport trait.
//!
//! This module defines:
//! - `RegisterTransport` trait - Fixed-width register transactions over one channel
//! - `Payload` type alias - Fixed-capacity transaction payload
//!
//! A transport is pure mechanism: it knows nothing about register names,
//! enablement or banks. Policy lives in the device handle and controller.

use crate::consts::MAX_PAYLOAD_BYTES;
use crate::hal::regs::RegisterWidth;
use std::io;
use std::path::Path;

/// Payload of a single register transaction (at most 16 bytes).
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_BYTES>;

/// Copy `bytes` into a [`Payload`]. Returns `None` if it exceeds 16 bytes.
pub fn payload_from(bytes: &[u8]) -> Option<Payload> {
    Payload::from_slice(bytes).ok()
}

/// Trait defining one communication channel to the controller.
///
/// # Lifecycle
///
/// 1. `open()` - Called once by the device handle
/// 2. `read()` / `write()` - Blocking transactions, no timeouts
/// 3. `close()` - Called on explicit close or runtime teardown
///
/// Transactions either succeed completely or fail; there are no partial
/// transfers.
pub trait RegisterTransport: Send {
    /// Backend identifier (e.g., "ioctl", "simulation").
    fn name(&self) -> &'static str;

    /// Open the channel at `path`.
    fn open(&mut self, path: &Path) -> io::Result<()>;

    /// Read exactly `width` bytes from `address`.
    fn read(&mut self, address: u16, width: RegisterWidth) -> io::Result<Payload>;

    /// Write `data` (exactly `width` bytes) to `address`.
    fn write(&mut self, address: u16, width: RegisterWidth, data: &[u8]) -> io::Result<()>;

    /// Close the channel.
    fn close(&mut self) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_capacity_is_sixteen_bytes() {
        assert!(payload_from(&[0u8; 16]).is_some());
        assert!(payload_from(&[0u8; 17]).is_none());
        assert_eq!(payload_from(&[1, 2]).unwrap().as_slice(), &[1, 2]);
    }
}
