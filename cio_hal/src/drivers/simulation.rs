//! Simulated register file.
//!
//! `SimulatedTransport` implements `RegisterTransport` over an in-memory,
//! byte-addressed register file. It backs `--simulate` runs and every test in
//! this crate:
//!
//! - every attempted transaction is recorded (including failed ones), keeping
//!   the most recent [`LOG_CAPACITY`] entries
//! - reads and writes can be made to fail per address, immediately or after a
//!   number of successful transactions
//! - addresses can be pinned to a value that ignores writes, which is how
//!   semaphore contention is modelled
//! - an optional live timer snapshots elapsed microseconds into the LPC timer
//!   bytes whenever 1 is written to the timer control register
//!
//! Clones share state, so a test keeps one clone for inspection after handing
//! the other to a controller.

use cio_common::hal::error::Access;
use cio_common::hal::regs::{Register, RegisterWidth};
use cio_common::hal::transport::{Payload, RegisterTransport, payload_from};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Version register value reported by a fresh simulator.
pub const DEFAULT_SIM_VERSION: u32 = 0x1001_0203;

/// Number of transactions kept in the log; older entries are dropped.
pub const LOG_CAPACITY: usize = 4096;

/// One recorded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Read or write
    pub access: Access,
    /// Register address
    pub address: u16,
    /// Declared width
    pub width: RegisterWidth,
    /// Bytes written (empty for reads)
    pub data: Payload,
}

#[derive(Debug, Default)]
struct SimState {
    memory: HashMap<u16, u8>,
    pinned: HashMap<u16, u8>,
    /// Remaining successful transactions before each armed failure
    failing: HashMap<(Access, u16), usize>,
    fail_open: bool,
    fail_close: bool,
    open: bool,
    opened_path: Option<PathBuf>,
    open_calls: usize,
    log: VecDeque<TransactionRecord>,
    live_timer: Option<Instant>,
}

impl SimState {
    fn byte(&self, address: u16) -> u8 {
        self.pinned
            .get(&address)
            .or_else(|| self.memory.get(&address))
            .copied()
            .unwrap_or(0)
    }

    fn store(&mut self, address: u16, bytes: &[u8]) {
        for (offset, value) in bytes.iter().enumerate() {
            let addr = address.wrapping_add(offset as u16);
            if !self.pinned.contains_key(&addr) {
                self.memory.insert(addr, *value);
            }
        }
    }

    fn should_fail(&mut self, access: Access, address: u16) -> bool {
        match self.failing.get_mut(&(access, address)) {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }

    fn snapshot_timer(&mut self) {
        if let Some(start) = self.live_timer {
            let micros = start.elapsed().as_micros() as u32;
            self.store(Register::LpcTimer0.address(), &micros.to_le_bytes());
        }
    }
}

/// In-memory register file implementing [`RegisterTransport`].
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// Create a simulator reporting [`DEFAULT_SIM_VERSION`].
    pub fn new() -> Self {
        Self::with_version(DEFAULT_SIM_VERSION)
    }

    /// Create a simulator reporting `version` in the version register.
    pub fn with_version(version: u32) -> Self {
        let sim = Self {
            state: Arc::new(Mutex::new(SimState::default())),
        };
        sim.set_register(Register::Version, &version.to_le_bytes());
        sim
    }

    /// Snapshot real elapsed time on every timer trigger.
    pub fn with_live_timer(self) -> Self {
        self.state.lock().live_timer = Some(Instant::now());
        self
    }

    /// Preset the bytes of a register (not recorded as a transaction).
    pub fn set_register(&self, register: Register, bytes: &[u8]) {
        self.state.lock().store(register.address(), bytes);
    }

    /// Preset a single byte at `address`.
    pub fn set_byte(&self, address: u16, value: u8) {
        self.state.lock().store(address, &[value]);
    }

    /// Current byte at `address`.
    pub fn byte(&self, address: u16) -> u8 {
        self.state.lock().byte(address)
    }

    /// Current value of a 1-byte register.
    pub fn register_byte(&self, register: Register) -> u8 {
        self.byte(register.address())
    }

    /// Pin `address` to `value`: reads return it, writes are ignored.
    pub fn pin(&self, address: u16, value: u8) {
        self.state.lock().pinned.insert(address, value);
    }

    /// Remove a pin; the last stored value becomes visible again.
    pub fn unpin(&self, address: u16) {
        self.state.lock().pinned.remove(&address);
    }

    /// Make every `access` transaction at `address` fail.
    pub fn fail(&self, access: Access, address: u16) {
        self.fail_after(access, address, 0);
    }

    /// Let `successes` more `access` transactions at `address` through, then
    /// fail every following one.
    pub fn fail_after(&self, access: Access, address: u16, successes: usize) {
        self.state.lock().failing.insert((access, address), successes);
    }

    /// Stop failing `access` transactions at `address`.
    pub fn heal(&self, access: Access, address: u16) {
        self.state.lock().failing.remove(&(access, address));
    }

    /// Make the next `open()` calls fail.
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make `close()` report an OS-level failure.
    pub fn fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Returns `true` while the channel is open.
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Path passed to the last successful `open()`.
    pub fn opened_path(&self) -> Option<PathBuf> {
        self.state.lock().opened_path.clone()
    }

    /// Number of `open()` calls, successful or not.
    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    /// Recorded transactions, oldest first.
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().log.iter().cloned().collect()
    }

    /// Number of recorded transactions.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().log.len()
    }

    /// Forget recorded transactions.
    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    fn record(state: &mut SimState, access: Access, address: u16, width: RegisterWidth, data: &[u8]) {
        let data = payload_from(data).unwrap_or_default();
        if state.log.len() == LOG_CAPACITY {
            state.log.pop_front();
        }
        state.log.push_back(TransactionRecord {
            access,
            address,
            width,
            data,
        });
    }
}

impl RegisterTransport for SimulatedTransport {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn open(&mut self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        state.open_calls += 1;
        if state.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("simulated open failure for {}", path.display()),
            ));
        }
        state.open = true;
        state.opened_path = Some(path.to_path_buf());
        Ok(())
    }

    fn read(&mut self, address: u16, width: RegisterWidth) -> io::Result<Payload> {
        let mut state = self.state.lock();
        Self::record(&mut state, Access::Read, address, width, &[]);
        if !state.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "channel not open"));
        }
        if state.should_fail(Access::Read, address) {
            return Err(io::Error::other("simulated read failure"));
        }

        let mut payload = Payload::new();
        for offset in 0..width.bytes() {
            let byte = state.byte(address.wrapping_add(offset as u16));
            // Capacity is MAX_PAYLOAD_BYTES, the widest register.
            let _ = payload.push(byte);
        }
        trace!("sim read {:#06x} ({}) -> {:02x?}", address, width, payload.as_slice());
        Ok(payload)
    }

    fn write(&mut self, address: u16, width: RegisterWidth, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        Self::record(&mut state, Access::Write, address, width, data);
        if !state.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "channel not open"));
        }
        if state.should_fail(Access::Write, address) {
            return Err(io::Error::other("simulated write failure"));
        }
        if data.len() != width.bytes() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("payload is {} bytes, register is {}", data.len(), width),
            ));
        }

        state.store(address, data);
        if address == Register::TimerControl.address() && data.first() == Some(&1) {
            state.snapshot_timer();
        }
        trace!("sim write {:#06x} ({}) <- {:02x?}", address, width, data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.open = false;
        if state.fail_close {
            return Err(io::Error::other("simulated close failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_sim() -> SimulatedTransport {
        let mut sim = SimulatedTransport::new();
        sim.open(Path::new("/dev/sim")).unwrap();
        sim
    }

    #[test]
    fn reads_back_written_bytes() {
        let mut sim = open_sim();
        sim.write(0x12, RegisterWidth::Byte, &[0xA5]).unwrap();
        let payload = sim.read(0x12, RegisterWidth::Byte).unwrap();
        assert_eq!(payload.as_slice(), &[0xA5]);
        assert_eq!(sim.transaction_count(), 2);
    }

    #[test]
    fn version_is_preset_little_endian() {
        let mut sim = open_sim();
        let payload = sim.read(0x00, RegisterWidth::DWord).unwrap();
        assert_eq!(payload.as_slice(), &DEFAULT_SIM_VERSION.to_le_bytes());
    }

    #[test]
    fn pinned_address_ignores_writes() {
        let mut sim = open_sim();
        sim.pin(0x30, 0);
        sim.write(0x30, RegisterWidth::Byte, &[1]).unwrap();
        assert_eq!(sim.read(0x30, RegisterWidth::Byte).unwrap()[0], 0);

        sim.unpin(0x30);
        assert_eq!(sim.byte(0x30), 0);
        sim.write(0x30, RegisterWidth::Byte, &[1]).unwrap();
        assert_eq!(sim.byte(0x30), 1);
    }

    #[test]
    fn injected_failures_are_recorded() {
        let mut sim = open_sim();
        sim.fail(Access::Read, 0x10);
        assert!(sim.read(0x10, RegisterWidth::Byte).is_err());
        assert_eq!(sim.transaction_count(), 1);

        sim.heal(Access::Read, 0x10);
        assert!(sim.read(0x10, RegisterWidth::Byte).is_ok());
    }

    #[test]
    fn delayed_failure_lets_earlier_transactions_through() {
        let mut sim = open_sim();
        sim.fail_after(Access::Write, 0x20, 1);
        assert!(sim.write(0x20, RegisterWidth::Byte, &[1]).is_ok());
        assert!(sim.write(0x20, RegisterWidth::Byte, &[0]).is_err());
        assert!(sim.write(0x20, RegisterWidth::Byte, &[0]).is_err());
        assert_eq!(sim.byte(0x20), 1);
    }

    #[test]
    fn log_keeps_only_recent_transactions() {
        let mut sim = open_sim();
        for _ in 0..LOG_CAPACITY + 10 {
            sim.read(0x10, RegisterWidth::Byte).unwrap();
        }
        sim.write(0x11, RegisterWidth::Byte, &[7]).unwrap();

        assert_eq!(sim.transaction_count(), LOG_CAPACITY);
        let log = sim.transactions();
        assert_eq!(log.last().map(|t| t.address), Some(0x11));
    }

    #[test]
    fn closed_channel_rejects_transactions() {
        let mut sim = SimulatedTransport::new();
        let err = sim.read(0x10, RegisterWidth::Byte).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn close_failure_still_closes() {
        let mut sim = open_sim();
        sim.fail_close(true);
        assert!(sim.close().is_err());
        assert!(!sim.is_open());
    }

    #[test]
    fn live_timer_snapshots_on_trigger() {
        let mut sim = SimulatedTransport::new().with_live_timer();
        sim.open(Path::new("/dev/sim")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        sim.write(Register::TimerControl.address(), RegisterWidth::Byte, &[1])
            .unwrap();

        let bytes: Vec<u8> = (0..4)
            .map(|i| sim.byte(Register::LpcTimer0.address() + i))
            .collect();
        let micros = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert!(micros >= 2_000);
    }
}
