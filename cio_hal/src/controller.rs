//! Device controller: lifecycle, identification and named register accessors.
//!
//! # Initialization
//!
//! 1. Open the transport at the configured device path.
//! 2. On failure the controller stays disabled for its whole lifetime.
//! 3. Read the 4-byte version register; on failure close the channel and
//!    stay disabled.
//! 4. Decode the firmware identity, enable the device, register a teardown
//!    hook that closes the channel, fix the digital bank count at 4.
//!
//! There is no lazy re-open and no register cache: every accessor is one
//! blocking round trip. The only local state is the output shadow bytes kept
//! by the bank layer.
//!
//! # Locking
//!
//! Accessors that issue a single transaction need no lock. Multi-step
//! operations (bit read-modify-write, semaphore transfers) take a
//! [`ProcessLockGuard`] obtained from [`DeviceController::process_lock`].

use cio_common::consts::{CIO_SERVICE_NAME, DIGITAL_BANK_COUNT};
use cio_common::hal::config::ControllerConfig;
use cio_common::hal::error::{HalError, IndexKind};
use cio_common::hal::regs::Register;
use cio_common::hal::transport::{Payload, RegisterTransport};
use cio_common::hal::types::FirmwareIdentity;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU8;
use tracing::{error, info};

use crate::handle::DeviceHandle;
use crate::lock::{ProcessLock, ProcessLockGuard};
use crate::teardown::TeardownRegistry;

/// LPC timer bytes, least significant first.
const TIMER_BYTES: [Register; 4] = [
    Register::LpcTimer0,
    Register::LpcTimer1,
    Register::LpcTimer2,
    Register::LpcTimer3,
];

/// Value written to the timer control register to latch the LPC timer.
const TIMER_SNAPSHOT: u8 = 1;

/// Returns `true` if the high nibble of `value` equals `expected`.
pub fn high_nibble_matches(value: u8, expected: u8) -> bool {
    (value >> 4) == expected
}

/// Top-level controller owning one device channel.
pub struct DeviceController {
    /// Device handle, shared with the teardown hook through a weak reference
    pub(crate) handle: Arc<Mutex<DeviceHandle>>,
    /// Process-wide lock shared by every controller
    lock: ProcessLock,
    /// Last successfully written values of output banks 2 and 3
    pub(crate) shadow: [AtomicU8; 2],
    /// Device path from configuration
    device_path: PathBuf,
}

impl DeviceController {
    /// Create a controller using the process-wide lock and teardown registry.
    ///
    /// Never fails: a device that cannot be opened or identified yields a
    /// disabled controller whose accessors all return `HalError::NotEnabled`.
    pub fn new(config: &ControllerConfig, transport: Box<dyn RegisterTransport>) -> Self {
        Self::with_runtime(
            config,
            transport,
            ProcessLock::global(),
            TeardownRegistry::global(),
        )
    }

    /// Create a controller with an injected lock and teardown registry.
    pub fn with_runtime(
        config: &ControllerConfig,
        transport: Box<dyn RegisterTransport>,
        lock: ProcessLock,
        teardown: &TeardownRegistry,
    ) -> Self {
        let mut handle = DeviceHandle::new(transport, &config.device_path);
        let enabled = initialize(&mut handle);
        let handle = Arc::new(Mutex::new(handle));

        if enabled {
            let weak = Arc::downgrade(&handle);
            teardown.register(
                format!("{}:{}", CIO_SERVICE_NAME, config.device_path.display()),
                Box::new(move || {
                    if let Some(handle) = weak.upgrade() {
                        // Close failures are logged by the handle.
                        let _ = handle.lock().close();
                    }
                }),
            );
        }

        Self {
            handle,
            lock,
            shadow: [AtomicU8::new(0), AtomicU8::new(0)],
            device_path: config.device_path.clone(),
        }
    }

    /// Returns `true` if the device is open and identified.
    pub fn is_enabled(&self) -> bool {
        self.handle.lock().is_enabled()
    }

    /// Firmware identity read at initialization.
    pub fn identity(&self) -> Option<FirmwareIdentity> {
        self.handle.lock().identity()
    }

    /// Number of digital banks (4 once enabled, 0 otherwise).
    pub fn bank_count(&self) -> usize {
        if self.is_enabled() {
            DIGITAL_BANK_COUNT
        } else {
            0
        }
    }

    /// Configured device path.
    pub fn device_path(&self) -> &std::path::Path {
        &self.device_path
    }

    /// Transport backend name.
    pub fn transport_name(&self) -> &'static str {
        self.handle.lock().transport_name()
    }

    /// The process-wide lock this controller participates in.
    pub fn process_lock(&self) -> &ProcessLock {
        &self.lock
    }

    /// Close the channel. The controller is disabled afterwards regardless of
    /// the result and is never re-opened.
    pub fn close(&self) -> Result<(), HalError> {
        self.handle.lock().close()
    }

    /// Fail with `NotEnabled` unless the device is open and identified.
    pub(crate) fn ensure_enabled(&self) -> Result<(), HalError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(HalError::NotEnabled)
        }
    }

    /// Fail with `LockNotHeld` unless `guard` belongs to this controller's lock.
    pub(crate) fn check_guard(&self, guard: &ProcessLockGuard<'_>) -> Result<(), HalError> {
        if guard.is_for(&self.lock) {
            Ok(())
        } else {
            Err(HalError::LockNotHeld)
        }
    }

    pub(crate) fn read_byte(&self, register: Register) -> Result<u8, HalError> {
        self.handle.lock().read_u8(register)
    }

    pub(crate) fn write_byte(&self, register: Register, value: u8) -> Result<(), HalError> {
        self.handle.lock().write_u8(register, value)
    }

    // ─── Generic access ─────────────────────────────────────────────

    /// Read any register at its declared width.
    pub fn read_register(&self, register: Register) -> Result<Payload, HalError> {
        self.handle.lock().read(register)
    }

    /// Write any register at its declared width.
    pub fn write_register(&self, register: Register, data: &[u8]) -> Result<(), HalError> {
        self.handle.lock().write(register, data)
    }

    /// Re-read the raw version register.
    pub fn version_register(&self) -> Result<u32, HalError> {
        let payload = self.read_register(Register::Version)?;
        Ok(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]))
    }

    // ─── Digital I/O ────────────────────────────────────────────────

    /// Digital input monitor 1 (bank 0).
    pub fn digital_input_monitor_1(&self) -> Result<u8, HalError> {
        self.read_byte(Register::DiMonitor1)
    }

    /// Digital input monitor 2 (bank 1).
    pub fn digital_input_monitor_2(&self) -> Result<u8, HalError> {
        self.read_byte(Register::DiMonitor2)
    }

    /// Digital output control 1 (bank 2).
    pub fn digital_output_control_1(&self) -> Result<u8, HalError> {
        self.read_byte(Register::DoControl1)
    }

    /// Set digital output control 1 (bank 2); updates the shadow byte.
    pub fn set_digital_output_control_1(&self, value: u8) -> Result<(), HalError> {
        self.set_bank_outputs(2, value)
    }

    /// Digital output control 2 (bank 3).
    pub fn digital_output_control_2(&self) -> Result<u8, HalError> {
        self.read_byte(Register::DoControl2)
    }

    /// Set digital output control 2 (bank 3); updates the shadow byte.
    pub fn set_digital_output_control_2(&self, value: u8) -> Result<(), HalError> {
        self.set_bank_outputs(3, value)
    }

    /// Light pole output control.
    pub fn light_pole(&self) -> Result<u8, HalError> {
        self.read_byte(Register::LightPole)
    }

    /// Set light pole output control.
    pub fn set_light_pole(&self, value: u8) -> Result<(), HalError> {
        self.write_byte(Register::LightPole, value)
    }

    /// Bumper input monitor.
    pub fn bumper_input(&self) -> Result<u8, HalError> {
        self.read_byte(Register::BumperInput)
    }

    // ─── Power ──────────────────────────────────────────────────────

    /// Peripheral power control 1 (power bank 0).
    pub fn peripheral_power_1(&self) -> Result<u8, HalError> {
        self.read_byte(Register::PowerControl1)
    }

    /// Set peripheral power control 1 (power bank 0).
    pub fn set_peripheral_power_1(&self, value: u8) -> Result<(), HalError> {
        self.write_byte(Register::PowerControl1, value)
    }

    /// Peripheral power control 2 (power bank 1).
    pub fn peripheral_power_2(&self) -> Result<u8, HalError> {
        self.read_byte(Register::PowerControl2)
    }

    /// Set peripheral power control 2 (power bank 1).
    pub fn set_peripheral_power_2(&self, value: u8) -> Result<(), HalError> {
        self.write_byte(Register::PowerControl2, value)
    }

    /// Peripheral power control 3 (power bank 2).
    pub fn peripheral_power_3(&self) -> Result<u8, HalError> {
        self.read_byte(Register::PowerControl3)
    }

    /// Set peripheral power control 3 (power bank 2).
    pub fn set_peripheral_power_3(&self, value: u8) -> Result<(), HalError> {
        self.write_byte(Register::PowerControl3, value)
    }

    /// Motion power status.
    pub fn motion_power_status(&self) -> Result<u8, HalError> {
        self.read_byte(Register::MotionPowerStatus)
    }

    /// Power status 1.
    pub fn power_status_1(&self) -> Result<u8, HalError> {
        self.read_byte(Register::PowerStatus1)
    }

    /// Power status 2.
    pub fn power_status_2(&self) -> Result<u8, HalError> {
        self.read_byte(Register::PowerStatus2)
    }

    // ─── LIDAR ──────────────────────────────────────────────────────

    /// LIDAR control.
    pub fn lidar_control(&self) -> Result<u8, HalError> {
        self.read_byte(Register::LidarControl)
    }

    /// Set LIDAR control.
    pub fn set_lidar_control(&self, value: u8) -> Result<(), HalError> {
        self.write_byte(Register::LidarControl, value)
    }

    /// LIDAR safety status.
    pub fn lidar_safety_status(&self) -> Result<u8, HalError> {
        self.read_byte(Register::LidarSafetyStatus)
    }

    // ─── Safety ─────────────────────────────────────────────────────

    /// E-stop status by zero-based channel (0..=3).
    pub fn estop_status(&self, channel: usize) -> Result<u8, HalError> {
        self.ensure_enabled()?;
        let register = Register::estop(channel)
            .ok_or_else(|| HalError::invalid_index(IndexKind::EstopChannel, channel))?;
        self.read_byte(register)
    }

    /// Read `register` and compare its high nibble with `expected`.
    pub fn compare_high_nibble(&self, register: Register, expected: u8) -> Result<bool, HalError> {
        Ok(high_nibble_matches(self.read_byte(register)?, expected))
    }

    /// Coarse E-stop classification: compare the high nibble of an E-stop
    /// status register with `expected`.
    pub fn estop_matches(&self, channel: usize, expected: u8) -> Result<bool, HalError> {
        self.ensure_enabled()?;
        let register = Register::estop(channel)
            .ok_or_else(|| HalError::invalid_index(IndexKind::EstopChannel, channel))?;
        self.compare_high_nibble(register, expected)
    }

    // ─── Semaphores ─────────────────────────────────────────────────

    /// Raw semaphore register by zero-based index (0..=3).
    pub fn semaphore(&self, index: usize) -> Result<u8, HalError> {
        self.ensure_enabled()?;
        let register = Register::semaphore(index)
            .ok_or_else(|| HalError::invalid_index(IndexKind::Semaphore, index))?;
        self.read_byte(register)
    }

    /// Write a raw semaphore register. Prefer the guarded analog transfers,
    /// which run the full acquire/release protocol.
    pub fn set_semaphore(&self, index: usize, value: u8) -> Result<(), HalError> {
        self.ensure_enabled()?;
        let register = Register::semaphore(index)
            .ok_or_else(|| HalError::invalid_index(IndexKind::Semaphore, index))?;
        self.write_byte(register, value)
    }

    // ─── Timing ─────────────────────────────────────────────────────

    /// One LPC timer byte (0 = least significant).
    pub fn lpc_timer(&self, byte: usize) -> Result<u8, HalError> {
        self.ensure_enabled()?;
        let register = Register::lpc_timer(byte)
            .ok_or_else(|| HalError::invalid_index(IndexKind::TimerByte, byte))?;
        self.read_byte(register)
    }

    /// Latch the hardware timer into the LPC timer bytes.
    pub fn trigger_timer_snapshot(&self) -> Result<(), HalError> {
        self.write_byte(Register::TimerControl, TIMER_SNAPSHOT)
    }

    /// Latch the hardware timer and compose the four LPC timer bytes
    /// (little-endian) into elapsed microseconds.
    ///
    /// Fails if the trigger write or any of the four reads fails.
    pub fn elapsed_microseconds(&self) -> Result<u32, HalError> {
        let mut handle = self.handle.lock();
        handle.write_u8(Register::TimerControl, TIMER_SNAPSHOT)?;

        let mut bytes = [0u8; 4];
        for (byte, register) in bytes.iter_mut().zip(TIMER_BYTES) {
            *byte = handle.read_u8(register)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }
}

/// Run the open/identify protocol. Returns `true` if the device is enabled.
fn initialize(handle: &mut DeviceHandle) -> bool {
    if let Err(e) = handle.open() {
        error!("Controller disabled: {}", e);
        return false;
    }

    match handle.identify() {
        Ok(identity) => {
            info!(
                "Controller {:?} enabled via '{}': {}",
                handle.path(),
                handle.transport_name(),
                identity
            );
            true
        }
        Err(e) => {
            error!("Controller identification failed, closing channel: {}", e);
            // Close failures are logged by the handle.
            let _ = handle.close();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SimulatedTransport;
    use cio_common::hal::error::Access;

    fn controller_with(sim: &SimulatedTransport) -> (DeviceController, TeardownRegistry) {
        let teardown = TeardownRegistry::new();
        let controller = DeviceController::with_runtime(
            &ControllerConfig::default(),
            Box::new(sim.clone()),
            ProcessLock::new(),
            &teardown,
        );
        (controller, teardown)
    }

    #[test]
    fn initialization_enables_and_registers_teardown() {
        let sim = SimulatedTransport::with_version(0x2001_0203);
        let (controller, teardown) = controller_with(&sim);

        assert!(controller.is_enabled());
        assert_eq!(controller.bank_count(), 4);
        assert_eq!(teardown.len(), 1);

        let id = controller.identity().unwrap();
        assert_eq!(id.firmware_revision, 0x03);
        assert_eq!(id.firmware_version, 0x02);
        assert_eq!(id.compatibility_code, 0x01);
        assert_eq!(id.fpga_type, 0x20);

        assert_eq!(teardown.run_all(), 1);
        assert!(!controller.is_enabled());
        assert_eq!(controller.bank_count(), 0);
        assert!(!sim.is_open());
    }

    #[test]
    fn teardown_after_controller_drop_is_harmless() {
        let sim = SimulatedTransport::new();
        let (controller, teardown) = controller_with(&sim);
        drop(controller);
        assert_eq!(teardown.run_all(), 1);
    }

    #[test]
    fn identification_failure_closes_channel() {
        let sim = SimulatedTransport::new();
        sim.fail(Access::Read, Register::Version.address());
        let (controller, teardown) = controller_with(&sim);

        assert!(!controller.is_enabled());
        assert_eq!(controller.bank_count(), 0);
        assert!(controller.identity().is_none());
        assert!(!sim.is_open());
        assert!(teardown.is_empty());
    }

    #[test]
    fn named_accessors_round_trip_hardware() {
        let sim = SimulatedTransport::new();
        let (controller, _teardown) = controller_with(&sim);

        controller.set_light_pole(0x05).unwrap();
        assert_eq!(sim.register_byte(Register::LightPole), 0x05);
        assert_eq!(controller.light_pole().unwrap(), 0x05);

        controller.set_lidar_control(0x81).unwrap();
        assert_eq!(controller.lidar_control().unwrap(), 0x81);

        controller.set_peripheral_power_2(0x0F).unwrap();
        assert_eq!(sim.register_byte(Register::PowerControl2), 0x0F);

        sim.set_register(Register::PowerStatus2, &[0x42]);
        assert_eq!(controller.power_status_2().unwrap(), 0x42);
    }

    #[test]
    fn accessor_failure_returns_error() {
        let sim = SimulatedTransport::new();
        let (controller, _teardown) = controller_with(&sim);
        sim.fail(Access::Write, Register::LightPole.address());

        assert!(matches!(
            controller.set_light_pole(1),
            Err(HalError::TransactionFailed { register: "light_pole", .. })
        ));
    }

    #[test]
    fn indexed_accessors_reject_out_of_range_without_io() {
        let sim = SimulatedTransport::new();
        let (controller, _teardown) = controller_with(&sim);
        sim.clear_log();

        assert_eq!(
            controller.estop_status(4),
            Err(HalError::invalid_index(IndexKind::EstopChannel, 4))
        );
        assert_eq!(
            controller.semaphore(9),
            Err(HalError::invalid_index(IndexKind::Semaphore, 9))
        );
        assert_eq!(
            controller.lpc_timer(4),
            Err(HalError::invalid_index(IndexKind::TimerByte, 4))
        );
        assert_eq!(sim.transaction_count(), 0);
    }

    #[test]
    fn high_nibble_comparison() {
        assert!(high_nibble_matches(0xA3, 0x0A));
        assert!(!high_nibble_matches(0xA3, 0x03));

        let sim = SimulatedTransport::new();
        let (controller, _teardown) = controller_with(&sim);
        sim.set_register(Register::EstopStatus3, &[0x21]);
        assert!(controller.estop_matches(2, 0x2).unwrap());
        assert!(!controller.estop_matches(2, 0x1).unwrap());
        assert!(controller
            .compare_high_nibble(Register::EstopStatus3, 0x2)
            .unwrap());

        sim.clear_log();
        assert!(matches!(
            controller.compare_high_nibble(Register::Version, 0x1),
            Err(HalError::InvalidIndex {
                kind: IndexKind::ByteRegister,
                ..
            })
        ));
        assert_eq!(sim.transaction_count(), 0);
    }

    #[test]
    fn elapsed_time_composes_little_endian() {
        let sim = SimulatedTransport::new();
        let (controller, _teardown) = controller_with(&sim);
        sim.set_register(Register::LpcTimer0, &[0x10, 0x00, 0x00, 0x00]);
        assert_eq!(controller.elapsed_microseconds().unwrap(), 0x0000_0010);

        sim.set_register(Register::LpcTimer0, &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(controller.elapsed_microseconds().unwrap(), 0x1234_5678);
        assert_eq!(sim.register_byte(Register::TimerControl), 1);
    }

    #[test]
    fn elapsed_time_fails_on_any_step() {
        let sim = SimulatedTransport::new();
        let (controller, _teardown) = controller_with(&sim);

        sim.fail(Access::Write, Register::TimerControl.address());
        sim.clear_log();
        assert!(controller.elapsed_microseconds().is_err());
        // Trigger failed, so no timer byte was read.
        assert_eq!(sim.transaction_count(), 1);

        sim.heal(Access::Write, Register::TimerControl.address());
        sim.fail(Access::Read, Register::LpcTimer2.address());
        assert!(matches!(
            controller.elapsed_microseconds(),
            Err(HalError::TransactionFailed { register: "lpc_timer_2", .. })
        ));
    }
}
