//! Controller register map.
//!
//! Every register is a stateless identifier: a numeric address plus a declared
//! payload width. Values are never cached here; every access is a round trip
//! through a [`RegisterTransport`](crate::hal::transport::RegisterTransport).
//!
//! | Register                | Address | Width |
//! |-------------------------|---------|-------|
//! | version                 | 0x00    | 4     |
//! | di_monitor_1/2          | 0x10-11 | 1     |
//! | do_control_1/2          | 0x12-13 | 1     |
//! | light_pole              | 0x14    | 1     |
//! | power_control_1..3      | 0x18-1A | 1     |
//! | motion_power_status     | 0x1B    | 1     |
//! | lidar_control           | 0x20    | 1     |
//! | lidar_safety_status     | 0x21    | 1     |
//! | bumper_input            | 0x22    | 1     |
//! | power_status_1/2        | 0x24-25 | 1     |
//! | estop_status_1..4       | 0x28-2B | 1     |
//! | semaphore_1..4          | 0x30-33 | 1     |
//! | timer_control           | 0x38    | 1     |
//! | lpc_timer_0..3          | 0x3C-3F | 1     |
//! | analog_block_1          | 0x100   | 16    |
//! | analog_block_2          | 0x180   | 16    |

use std::fmt;
use std::str::FromStr;

use static_assertions::{const_assert, const_assert_eq};

use crate::consts::{ESTOP_CHANNELS, MAX_PAYLOAD_BYTES, SEMAPHORE_COUNT};

/// Declared payload width of a register transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterWidth {
    /// 1 byte
    Byte,
    /// 2 bytes
    Word,
    /// 4 bytes
    DWord,
    /// 16 bytes (shared memory blocks)
    Block,
}

impl RegisterWidth {
    /// Payload size in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::DWord => 4,
            Self::Block => MAX_PAYLOAD_BYTES,
        }
    }

    /// Map a byte count back onto a width class.
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Word),
            4 => Some(Self::DWord),
            16 => Some(Self::Block),
            _ => None,
        }
    }
}

impl fmt::Display for RegisterWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.bytes())
    }
}

/// Named controller registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Firmware identity (revision, version, compatibility, FPGA type).
    Version,
    /// Digital input monitor, bank 0.
    DiMonitor1,
    /// Digital input monitor, bank 1.
    DiMonitor2,
    /// Digital output control, bank 2.
    DoControl1,
    /// Digital output control, bank 3.
    DoControl2,
    /// Light pole output control.
    LightPole,
    /// Peripheral power control, power bank 0.
    PowerControl1,
    /// Peripheral power control, power bank 1.
    PowerControl2,
    /// Peripheral power control, power bank 2.
    PowerControl3,
    /// Motion power status.
    MotionPowerStatus,
    /// LIDAR control.
    LidarControl,
    /// LIDAR safety status.
    LidarSafetyStatus,
    /// Bumper input monitor.
    BumperInput,
    /// Power status 1.
    PowerStatus1,
    /// Power status 2.
    PowerStatus2,
    /// E-stop status 1.
    EstopStatus1,
    /// E-stop status 2.
    EstopStatus2,
    /// E-stop status 3.
    EstopStatus3,
    /// E-stop status 4.
    EstopStatus4,
    /// Semaphore guarding analog block 1.
    Semaphore1,
    /// Semaphore guarding analog block 2.
    Semaphore2,
    /// Semaphore 3 (unassigned).
    Semaphore3,
    /// Semaphore 4 (unassigned).
    Semaphore4,
    /// Timer snapshot trigger.
    TimerControl,
    /// LPC timer, least significant byte.
    LpcTimer0,
    /// LPC timer, byte 1.
    LpcTimer1,
    /// LPC timer, byte 2.
    LpcTimer2,
    /// LPC timer, most significant byte.
    LpcTimer3,
    /// Analog shared memory block 1.
    AnalogBlock1,
    /// Analog shared memory block 2.
    AnalogBlock2,
}

impl Register {
    /// Every register, in address order.
    pub const ALL: [Register; 30] = [
        Self::Version,
        Self::DiMonitor1,
        Self::DiMonitor2,
        Self::DoControl1,
        Self::DoControl2,
        Self::LightPole,
        Self::PowerControl1,
        Self::PowerControl2,
        Self::PowerControl3,
        Self::MotionPowerStatus,
        Self::LidarControl,
        Self::LidarSafetyStatus,
        Self::BumperInput,
        Self::PowerStatus1,
        Self::PowerStatus2,
        Self::EstopStatus1,
        Self::EstopStatus2,
        Self::EstopStatus3,
        Self::EstopStatus4,
        Self::Semaphore1,
        Self::Semaphore2,
        Self::Semaphore3,
        Self::Semaphore4,
        Self::TimerControl,
        Self::LpcTimer0,
        Self::LpcTimer1,
        Self::LpcTimer2,
        Self::LpcTimer3,
        Self::AnalogBlock1,
        Self::AnalogBlock2,
    ];

    /// Numeric register address.
    pub const fn address(self) -> u16 {
        match self {
            Self::Version => 0x00,
            Self::DiMonitor1 => 0x10,
            Self::DiMonitor2 => 0x11,
            Self::DoControl1 => 0x12,
            Self::DoControl2 => 0x13,
            Self::LightPole => 0x14,
            Self::PowerControl1 => 0x18,
            Self::PowerControl2 => 0x19,
            Self::PowerControl3 => 0x1A,
            Self::MotionPowerStatus => 0x1B,
            Self::LidarControl => 0x20,
            Self::LidarSafetyStatus => 0x21,
            Self::BumperInput => 0x22,
            Self::PowerStatus1 => 0x24,
            Self::PowerStatus2 => 0x25,
            Self::EstopStatus1 => 0x28,
            Self::EstopStatus2 => 0x29,
            Self::EstopStatus3 => 0x2A,
            Self::EstopStatus4 => 0x2B,
            Self::Semaphore1 => 0x30,
            Self::Semaphore2 => 0x31,
            Self::Semaphore3 => 0x32,
            Self::Semaphore4 => 0x33,
            Self::TimerControl => 0x38,
            Self::LpcTimer0 => 0x3C,
            Self::LpcTimer1 => 0x3D,
            Self::LpcTimer2 => 0x3E,
            Self::LpcTimer3 => 0x3F,
            Self::AnalogBlock1 => 0x100,
            Self::AnalogBlock2 => 0x180,
        }
    }

    /// Declared payload width.
    pub const fn width(self) -> RegisterWidth {
        match self {
            Self::Version => RegisterWidth::DWord,
            Self::AnalogBlock1 | Self::AnalogBlock2 => RegisterWidth::Block,
            _ => RegisterWidth::Byte,
        }
    }

    /// Human-readable register name used in logs and on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::DiMonitor1 => "di_monitor_1",
            Self::DiMonitor2 => "di_monitor_2",
            Self::DoControl1 => "do_control_1",
            Self::DoControl2 => "do_control_2",
            Self::LightPole => "light_pole",
            Self::PowerControl1 => "power_control_1",
            Self::PowerControl2 => "power_control_2",
            Self::PowerControl3 => "power_control_3",
            Self::MotionPowerStatus => "motion_power_status",
            Self::LidarControl => "lidar_control",
            Self::LidarSafetyStatus => "lidar_safety_status",
            Self::BumperInput => "bumper_input",
            Self::PowerStatus1 => "power_status_1",
            Self::PowerStatus2 => "power_status_2",
            Self::EstopStatus1 => "estop_status_1",
            Self::EstopStatus2 => "estop_status_2",
            Self::EstopStatus3 => "estop_status_3",
            Self::EstopStatus4 => "estop_status_4",
            Self::Semaphore1 => "semaphore_1",
            Self::Semaphore2 => "semaphore_2",
            Self::Semaphore3 => "semaphore_3",
            Self::Semaphore4 => "semaphore_4",
            Self::TimerControl => "timer_control",
            Self::LpcTimer0 => "lpc_timer_0",
            Self::LpcTimer1 => "lpc_timer_1",
            Self::LpcTimer2 => "lpc_timer_2",
            Self::LpcTimer3 => "lpc_timer_3",
            Self::AnalogBlock1 => "analog_block_1",
            Self::AnalogBlock2 => "analog_block_2",
        }
    }

    /// E-stop status register by zero-based channel.
    pub const fn estop(channel: usize) -> Option<Self> {
        match channel {
            0 => Some(Self::EstopStatus1),
            1 => Some(Self::EstopStatus2),
            2 => Some(Self::EstopStatus3),
            3 => Some(Self::EstopStatus4),
            _ => None,
        }
    }

    /// Semaphore register by zero-based index.
    pub const fn semaphore(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Semaphore1),
            1 => Some(Self::Semaphore2),
            2 => Some(Self::Semaphore3),
            3 => Some(Self::Semaphore4),
            _ => None,
        }
    }

    /// LPC timer byte register by byte index (0 = least significant).
    pub const fn lpc_timer(byte: usize) -> Option<Self> {
        match byte {
            0 => Some(Self::LpcTimer0),
            1 => Some(Self::LpcTimer1),
            2 => Some(Self::LpcTimer2),
            3 => Some(Self::LpcTimer3),
            _ => None,
        }
    }

    /// Returns `true` for registers software may write.
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Self::DoControl1
                | Self::DoControl2
                | Self::LightPole
                | Self::PowerControl1
                | Self::PowerControl2
                | Self::PowerControl3
                | Self::LidarControl
                | Self::Semaphore1
                | Self::Semaphore2
                | Self::Semaphore3
                | Self::Semaphore4
                | Self::TimerControl
                | Self::AnalogBlock1
                | Self::AnalogBlock2
        )
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name() == wanted)
            .ok_or_else(|| format!("unknown register '{s}'"))
    }
}

// The elapsed-time composition reads four consecutive timer bytes.
const_assert_eq!(Register::LpcTimer1.address(), Register::LpcTimer0.address() + 1);
const_assert_eq!(Register::LpcTimer2.address(), Register::LpcTimer0.address() + 2);
const_assert_eq!(Register::LpcTimer3.address(), Register::LpcTimer0.address() + 3);

// Indexed lookups cover exactly the counted registers.
const_assert!(Register::estop(ESTOP_CHANNELS - 1).is_some());
const_assert!(Register::estop(ESTOP_CHANNELS).is_none());
const_assert!(Register::semaphore(SEMAPHORE_COUNT - 1).is_some());
const_assert!(Register::semaphore(SEMAPHORE_COUNT).is_none());
