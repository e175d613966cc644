//! Bank abstraction.
//!
//! Digital banks (0-indexed, 8 bits each):
//!
//! | Bank | Direction | Register       |
//! |------|-----------|----------------|
//! | 0    | input     | di_monitor_1   |
//! | 1    | input     | di_monitor_2   |
//! | 2    | output    | do_control_1   |
//! | 3    | output    | do_control_2   |
//!
//! Peripheral power banks 0, 1, 2 are outputs backed by power_control_1..3.
//!
//! Out-of-range banks and bits fail with `HalError::InvalidIndex` before any
//! transaction is issued.

use cio_common::consts::BITS_PER_BANK;
use cio_common::hal::error::{HalError, IndexKind};
use cio_common::hal::regs::Register;
use cio_common::hal::types::BankDirection;
use std::sync::atomic::Ordering;
use tracing::debug;

use crate::controller::DeviceController;
use crate::lock::ProcessLockGuard;

/// Direction of a digital bank. Pure; no I/O.
pub fn bank_direction(bank: usize) -> BankDirection {
    match bank {
        0 | 1 => BankDirection::Input,
        2 | 3 => BankDirection::Output,
        _ => BankDirection::Invalid,
    }
}

/// Register backing an input bank.
pub fn input_register(bank: usize) -> Result<Register, HalError> {
    match bank {
        0 => Ok(Register::DiMonitor1),
        1 => Ok(Register::DiMonitor2),
        _ => Err(HalError::invalid_index(IndexKind::InputBank, bank)),
    }
}

/// Register backing an output bank.
pub fn output_register(bank: usize) -> Result<Register, HalError> {
    match bank {
        2 => Ok(Register::DoControl1),
        3 => Ok(Register::DoControl2),
        _ => Err(HalError::invalid_index(IndexKind::OutputBank, bank)),
    }
}

/// Register backing a peripheral power bank.
pub fn power_register(bank: usize) -> Result<Register, HalError> {
    match bank {
        0 => Ok(Register::PowerControl1),
        1 => Ok(Register::PowerControl2),
        2 => Ok(Register::PowerControl3),
        _ => Err(HalError::invalid_index(IndexKind::PowerBank, bank)),
    }
}

fn bit_mask(bit: u8) -> Result<u8, HalError> {
    if bit < BITS_PER_BANK {
        Ok(1 << bit)
    } else {
        Err(HalError::invalid_index(IndexKind::Bit, usize::from(bit)))
    }
}

/// Operation applied to one bit of a read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BitOp {
    Set,
    Clear,
    Toggle,
}

impl BitOp {
    fn apply(self, value: u8, mask: u8) -> u8 {
        match self {
            Self::Set => value | mask,
            Self::Clear => value & !mask,
            Self::Toggle => value ^ mask,
        }
    }
}

impl DeviceController {
    // ─── Digital banks ──────────────────────────────────────────────

    /// Read an input bank (0 or 1).
    pub fn bank_inputs(&self, bank: usize) -> Result<u8, HalError> {
        self.ensure_enabled()?;
        let register = input_register(bank)?;
        self.read_byte(register)
    }

    /// Read an output bank (2 or 3) from hardware.
    pub fn bank_outputs(&self, bank: usize) -> Result<u8, HalError> {
        self.ensure_enabled()?;
        let register = output_register(bank)?;
        self.read_byte(register)
    }

    /// Write an output bank (2 or 3). The shadow byte is updated only after
    /// the hardware write succeeds.
    pub fn set_bank_outputs(&self, bank: usize, value: u8) -> Result<(), HalError> {
        self.ensure_enabled()?;
        let register = output_register(bank)?;
        self.write_byte(register, value)?;
        self.shadow[bank - 2].store(value, Ordering::Release);
        debug!("Output bank {} = {:#04x}", bank, value);
        Ok(())
    }

    /// Last value successfully written to an output bank (2 or 3) through
    /// this controller. No I/O.
    pub fn shadow_outputs(&self, bank: usize) -> Result<u8, HalError> {
        output_register(bank)?;
        Ok(self.shadow[bank - 2].load(Ordering::Acquire))
    }

    /// Set one bit of an output bank (read-modify-write).
    pub fn set_output_bit(
        &self,
        guard: &ProcessLockGuard<'_>,
        bank: usize,
        bit: u8,
    ) -> Result<(), HalError> {
        self.modify_output_bit(guard, bank, bit, BitOp::Set)
    }

    /// Clear one bit of an output bank (read-modify-write).
    pub fn clear_output_bit(
        &self,
        guard: &ProcessLockGuard<'_>,
        bank: usize,
        bit: u8,
    ) -> Result<(), HalError> {
        self.modify_output_bit(guard, bank, bit, BitOp::Clear)
    }

    fn modify_output_bit(
        &self,
        guard: &ProcessLockGuard<'_>,
        bank: usize,
        bit: u8,
        op: BitOp,
    ) -> Result<(), HalError> {
        self.ensure_enabled()?;
        self.check_guard(guard)?;
        output_register(bank)?;
        let mask = bit_mask(bit)?;

        let current = self.bank_outputs(bank)?;
        self.set_bank_outputs(bank, op.apply(current, mask))
    }

    // ─── Peripheral power banks ─────────────────────────────────────

    /// Read a power bank (0..=2).
    pub fn power_outputs(&self, bank: usize) -> Result<u8, HalError> {
        self.ensure_enabled()?;
        let register = power_register(bank)?;
        self.read_byte(register)
    }

    /// Write a power bank (0..=2).
    pub fn set_power_outputs(&self, bank: usize, value: u8) -> Result<(), HalError> {
        self.ensure_enabled()?;
        let register = power_register(bank)?;
        self.write_byte(register, value)
    }

    /// Switch one power output: `on` sets the bit, `!on` clears it.
    /// The result never depends on the bit's previous state.
    pub fn set_power_output(
        &self,
        guard: &ProcessLockGuard<'_>,
        bank: usize,
        bit: u8,
        on: bool,
    ) -> Result<(), HalError> {
        let op = if on { BitOp::Set } else { BitOp::Clear };
        self.modify_power_bit(guard, bank, bit, op)
    }

    /// Invert one power output (XOR).
    pub fn toggle_power_output(
        &self,
        guard: &ProcessLockGuard<'_>,
        bank: usize,
        bit: u8,
    ) -> Result<(), HalError> {
        self.modify_power_bit(guard, bank, bit, BitOp::Toggle)
    }

    fn modify_power_bit(
        &self,
        guard: &ProcessLockGuard<'_>,
        bank: usize,
        bit: u8,
        op: BitOp,
    ) -> Result<(), HalError> {
        self.ensure_enabled()?;
        self.check_guard(guard)?;
        let register = power_register(bank)?;
        let mask = bit_mask(bit)?;

        let current = self.read_byte(register)?;
        self.write_byte(register, op.apply(current, mask))
    }
}
