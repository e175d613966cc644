//! Semaphore arbitration for the two shared analog memory blocks.
//!
//! Each 16-byte block is guarded by its own 1-byte semaphore register:
//!
//! 1. Write 1 to the semaphore.
//! 2. Read it back. Zero means another party holds it: fail with
//!    `ContentionFailed(acquire)` without touching the block. If the
//!    read-back transaction itself fails, the semaphore is cleared before the
//!    error is returned.
//! 3. Transfer 16 bytes at the block base plus the channel offset.
//! 4. Write 0 to the semaphore.
//! 5. Read it back. Non-zero is reported as `ContentionFailed(release)` next
//!    to the transfer result, since the transfer itself already happened.
//!
//! Contention is reported immediately. Nothing here retries or waits.
//! The whole sequence runs under the device handle lock and requires the
//! caller's [`ProcessLockGuard`].

use cio_common::consts::ANALOG_CHANNELS;
use cio_common::hal::error::{Access, HalError, IndexKind, SemaphorePhase};
use cio_common::hal::regs::Register;
use cio_common::hal::transport::Payload;
use cio_common::hal::types::{AnalogBlock, AnalogSample};
use tracing::{debug, warn};

use crate::controller::DeviceController;
use crate::handle::DeviceHandle;
use crate::lock::ProcessLockGuard;

/// Result of a completed semaphore-guarded transfer.
///
/// `value` is the transfer result. `release` carries the warning-level
/// `ContentionFailed(release)` (or the failed release transaction) when the
/// semaphore could not be confirmed released.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct GuardedTransfer<T> {
    /// Data read or written under the semaphore
    pub value: T,
    /// Outcome of the release step
    pub release: Result<(), HalError>,
}

impl<T> GuardedTransfer<T> {
    /// Returns `true` if the semaphore was confirmed released.
    pub fn is_clean(&self) -> bool {
        self.release.is_ok()
    }

    /// Discard the transfer value on release failure.
    pub fn into_result(self) -> Result<T, HalError> {
        self.release.map(|()| self.value)
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> GuardedTransfer<U> {
        GuardedTransfer {
            value: f(self.value),
            release: self.release,
        }
    }
}

fn channel_offset(channel: usize) -> Result<u16, HalError> {
    if channel < ANALOG_CHANNELS {
        Ok(channel as u16)
    } else {
        Err(HalError::invalid_index(IndexKind::AnalogChannel, channel))
    }
}

/// Once the write of 1 has gone through, a failed read-back still clears the
/// semaphore before the read error is returned.
fn acquire(handle: &mut DeviceHandle, semaphore: Register) -> Result<(), HalError> {
    handle.write_u8(semaphore, 1)?;
    let value = match handle.read_u8(semaphore) {
        Ok(value) => value,
        Err(e) => {
            if let Err(release_err) = release(handle, semaphore) {
                warn!("{} after failed acquire: {}", semaphore, release_err);
            }
            return Err(e);
        }
    };
    if value == 0 {
        warn!("{} held elsewhere, acquire failed", semaphore);
        return Err(HalError::ContentionFailed {
            semaphore: semaphore.name(),
            phase: SemaphorePhase::Acquire,
        });
    }
    Ok(())
}

fn release(handle: &mut DeviceHandle, semaphore: Register) -> Result<(), HalError> {
    handle.write_u8(semaphore, 0)?;
    if handle.read_u8(semaphore)? != 0 {
        warn!("{} still set after release", semaphore);
        return Err(HalError::ContentionFailed {
            semaphore: semaphore.name(),
            phase: SemaphorePhase::Release,
        });
    }
    Ok(())
}

impl DeviceController {
    /// Run `transfer` on `block` under its hardware semaphore.
    ///
    /// The semaphore is released even when the transfer fails; in that case
    /// the transfer error is returned and a release failure is only logged.
    fn with_semaphore<T>(
        &self,
        guard: &ProcessLockGuard<'_>,
        block: AnalogBlock,
        channel: usize,
        access: Access,
        transfer: impl FnOnce(&mut DeviceHandle, Register, u16) -> Result<T, HalError>,
    ) -> Result<GuardedTransfer<T>, HalError> {
        self.ensure_enabled()?;
        self.check_guard(guard)?;
        let offset = channel_offset(channel)?;
        let semaphore = block.semaphore();

        let mut handle = self.handle.lock();
        acquire(&mut *handle, semaphore)?;
        debug!("{} acquired for {} of channel {}", semaphore, access, channel);

        let value = transfer(&mut *handle, block.data_register(), offset);
        let released = release(&mut *handle, semaphore);

        match value {
            Ok(value) => Ok(GuardedTransfer {
                value,
                release: released,
            }),
            Err(e) => {
                if let Err(release_err) = released {
                    warn!("{} after failed {}: {}", block, access, release_err);
                }
                Err(e)
            }
        }
    }

    /// Read the 16-byte window of `block` at `channel` (0..8).
    pub fn read_analog_block(
        &self,
        guard: &ProcessLockGuard<'_>,
        block: AnalogBlock,
        channel: usize,
    ) -> Result<GuardedTransfer<Payload>, HalError> {
        self.with_semaphore(guard, block, channel, Access::Read, |handle, register, offset| {
            handle.read_at(register, offset)
        })
    }

    /// Write the 16-byte window of `block` at `channel` (0..8).
    pub fn write_analog_block(
        &self,
        guard: &ProcessLockGuard<'_>,
        block: AnalogBlock,
        channel: usize,
        data: &[u8; 16],
    ) -> Result<GuardedTransfer<()>, HalError> {
        self.with_semaphore(guard, block, channel, Access::Write, |handle, register, offset| {
            handle.write_at(register, offset, data)
        })
    }

    /// Read and decode one analog sample.
    pub fn analog_sample(
        &self,
        guard: &ProcessLockGuard<'_>,
        block: AnalogBlock,
        channel: usize,
    ) -> Result<GuardedTransfer<AnalogSample>, HalError> {
        let transfer = self.read_analog_block(guard, block, channel)?;
        // Block reads are length-checked to 16 bytes by the handle.
        Ok(transfer.map(|payload| AnalogSample::from_payload(&payload).unwrap_or_default()))
    }

    /// Read one analog channel as volts (linear 0-5 V).
    pub fn analog_voltage(
        &self,
        guard: &ProcessLockGuard<'_>,
        block: AnalogBlock,
        channel: usize,
    ) -> Result<GuardedTransfer<f64>, HalError> {
        Ok(self.analog_sample(guard, block, channel)?.map(|s| s.volts))
    }
}
