//! Controller value types.
//!
//! - `FirmwareIdentity` - Decoded version register
//! - `BankDirection` - Direction of a digital bank
//! - `AnalogBlock` - One of the two semaphore-guarded analog memory blocks
//! - `AnalogSample` - Raw converter value with its linear 0-5 V reading

use crate::consts::{ADC_FULL_SCALE, ADC_REFERENCE_VOLTS};
use crate::hal::regs::Register;
use std::fmt;

/// Firmware identification fields read from the version register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareIdentity {
    /// Firmware revision (byte 0)
    pub firmware_revision: u8,
    /// Firmware version (byte 1)
    pub firmware_version: u8,
    /// Compatibility code (byte 2)
    pub compatibility_code: u8,
    /// FPGA type (byte 3)
    pub fpga_type: u8,
}

impl FirmwareIdentity {
    /// Decode a version register value.
    ///
    /// `0x20010203` decodes to revision `0x03`, version `0x02`,
    /// compatibility `0x01`, FPGA type `0x20`.
    pub const fn from_register(value: u32) -> Self {
        let [firmware_revision, firmware_version, compatibility_code, fpga_type] =
            value.to_le_bytes();
        Self {
            firmware_revision,
            firmware_version,
            compatibility_code,
            fpga_type,
        }
    }

    /// Re-encode into the raw register value.
    pub const fn to_register(self) -> u32 {
        u32::from_le_bytes([
            self.firmware_revision,
            self.firmware_version,
            self.compatibility_code,
            self.fpga_type,
        ])
    }
}

impl fmt::Display for FirmwareIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fw {}.{} compat {:#04x} fpga {:#04x}",
            self.firmware_version, self.firmware_revision, self.compatibility_code, self.fpga_type
        )
    }
}

/// Direction of a digital bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankDirection {
    /// Input-only bank
    Input,
    /// Output-only bank
    Output,
    /// Unassigned index
    Invalid,
}

impl fmt::Display for BankDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}

/// Semaphore-guarded analog memory block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalogBlock {
    /// Block 1, guarded by semaphore 1
    One,
    /// Block 2, guarded by semaphore 2
    Two,
}

impl AnalogBlock {
    /// Block by its 1-based number as printed on the register map.
    pub const fn from_number(number: usize) -> Option<Self> {
        match number {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    /// 1-based block number.
    pub const fn number(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Base data register of the block.
    pub const fn data_register(self) -> Register {
        match self {
            Self::One => Register::AnalogBlock1,
            Self::Two => Register::AnalogBlock2,
        }
    }

    /// Semaphore register guarding the block.
    pub const fn semaphore(self) -> Register {
        match self {
            Self::One => Register::Semaphore1,
            Self::Two => Register::Semaphore2,
        }
    }
}

impl fmt::Display for AnalogBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "analog block {}", self.number())
    }
}

/// One analog conversion value.
///
/// The 12-bit sample sits in the first two payload bytes (little-endian);
/// the upper four bits are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalogSample {
    /// Raw converter value (0..=ADC_FULL_SCALE)
    pub raw: u16,
    /// Linear 0-5 V reading
    pub volts: f64,
}

impl AnalogSample {
    /// Build a sample from a raw converter value.
    pub fn from_raw(raw: u16) -> Self {
        let raw = raw & ADC_FULL_SCALE;
        Self {
            raw,
            volts: f64::from(raw) * ADC_REFERENCE_VOLTS / f64::from(ADC_FULL_SCALE),
        }
    }

    /// Decode from a block payload. Returns `None` if fewer than two bytes.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match payload {
            [lo, hi, ..] => Some(Self::from_raw(u16::from_le_bytes([*lo, *hi]))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_identity_decodes_little_endian() {
        let id = FirmwareIdentity::from_register(0x2001_0203);
        assert_eq!(id.firmware_revision, 0x03);
        assert_eq!(id.firmware_version, 0x02);
        assert_eq!(id.compatibility_code, 0x01);
        assert_eq!(id.fpga_type, 0x20);
        assert_eq!(id.to_register(), 0x2001_0203);
    }

    #[test]
    fn analog_block_lookup() {
        assert_eq!(AnalogBlock::from_number(1), Some(AnalogBlock::One));
        assert_eq!(AnalogBlock::from_number(0), None);
        assert_eq!(AnalogBlock::from_number(3), None);
        assert_eq!(AnalogBlock::Two.semaphore(), Register::Semaphore2);
        assert_eq!(AnalogBlock::Two.data_register(), Register::AnalogBlock2);
    }

    #[test]
    fn analog_sample_linear_scale() {
        let zero = AnalogSample::from_raw(0);
        assert_eq!(zero.volts, 0.0);

        let full = AnalogSample::from_raw(ADC_FULL_SCALE);
        assert!((full.volts - 5.0).abs() < 1e-9);

        // Upper nibble is masked off.
        let masked = AnalogSample::from_raw(0xF800);
        assert_eq!(masked.raw, 0x0800);

        let from_bytes = AnalogSample::from_payload(&[0xFF, 0x07, 0xAA]).unwrap();
        assert_eq!(from_bytes.raw, 0x07FF);
        assert!(AnalogSample::from_payload(&[0x01]).is_none());
    }
}
