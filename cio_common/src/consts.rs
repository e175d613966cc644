//! System-wide constants for the CIO workspace.
//!
//! Single source of truth for numeric limits and default paths.

/// Canonical service name (used for logging and teardown hook names).
pub const CIO_SERVICE_NAME: &str = "cio_hal";

/// Default controller character device.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/cio0";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cio/controller.toml";

/// Number of digital banks (two input, two output).
pub const DIGITAL_BANK_COUNT: usize = 4;

/// Number of peripheral power banks.
pub const POWER_BANK_COUNT: usize = 3;

/// Bits per bank.
pub const BITS_PER_BANK: u8 = 8;

/// Number of E-stop status registers.
pub const ESTOP_CHANNELS: usize = 4;

/// Number of hardware semaphore registers.
pub const SEMAPHORE_COUNT: usize = 4;

/// Number of analog channels addressable inside one analog block.
pub const ANALOG_CHANNELS: usize = 8;

/// Largest payload of a single register transaction, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 16;

/// Full-scale raw value of the 12-bit analog converter.
pub const ADC_FULL_SCALE: u16 = 0x0FFF;

/// Analog reference voltage (linear 0-5 V scale).
pub const ADC_REFERENCE_VOLTS: f64 = 5.0;
