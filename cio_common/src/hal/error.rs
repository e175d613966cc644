//! HAL error types.
//!
//! Every accessor returns `Result<_, HalError>`. There is no retry logic
//! anywhere in this layer; a failure is reported once and the caller decides.

use std::fmt;
use thiserror::Error;

/// Direction of a register transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read transaction
    Read,
    /// Write transaction
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Step of the semaphore protocol that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphorePhase {
    /// Semaphore read back zero after being set.
    Acquire,
    /// Semaphore read back non-zero after being cleared.
    Release,
}

impl fmt::Display for SemaphorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquire => f.write_str("acquire"),
            Self::Release => f.write_str("release"),
        }
    }
}

/// Kind of index rejected by [`HalError::InvalidIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Digital bank used as input
    InputBank,
    /// Digital bank used as output
    OutputBank,
    /// Peripheral power bank
    PowerBank,
    /// Bit within a bank
    Bit,
    /// E-stop status channel
    EstopChannel,
    /// Semaphore register
    Semaphore,
    /// LPC timer byte
    TimerByte,
    /// Analog block
    AnalogBlock,
    /// Analog channel within a block
    AnalogChannel,
    /// Register used with byte access (index is its address)
    ByteRegister,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InputBank => "input bank",
            Self::OutputBank => "output bank",
            Self::PowerBank => "power bank",
            Self::Bit => "bit",
            Self::EstopChannel => "e-stop channel",
            Self::Semaphore => "semaphore",
            Self::TimerByte => "timer byte",
            Self::AnalogBlock => "analog block",
            Self::AnalogChannel => "analog channel",
            Self::ByteRegister => "byte register",
        };
        f.write_str(s)
    }
}

/// Error types for HAL operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// Communication channel could not be opened.
    #[error("Failed to open {path}: {reason}")]
    OpenFailed {
        /// Device path
        path: String,
        /// OS-level reason
        reason: String,
    },

    /// Operation attempted while the device is disabled.
    #[error("Device not enabled")]
    NotEnabled,

    /// A single register round trip failed.
    #[error("Register {register} {access} failed: {reason}")]
    TransactionFailed {
        /// Register name
        register: &'static str,
        /// Attempted access
        access: Access,
        /// OS-level reason
        reason: String,
    },

    /// Hardware semaphore could not be acquired or was not confirmed released.
    #[error("Semaphore {semaphore} {phase} failed")]
    ContentionFailed {
        /// Semaphore register name
        semaphore: &'static str,
        /// Protocol step that failed
        phase: SemaphorePhase,
    },

    /// Bank, bit or channel index outside its declared range.
    #[error("Invalid {kind} index {index}")]
    InvalidIndex {
        /// What the index addresses
        kind: IndexKind,
        /// Rejected value
        index: usize,
    },

    /// Channel close reported an OS-level failure.
    #[error("Close failed: {0}")]
    CloseFailed(String),

    /// Compound operation called with a guard of another lock.
    #[error("Process lock not held by caller")]
    LockNotHeld,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HalError {
    /// Returns `true` for warning-level failures: the semaphore was not
    /// confirmed released, but the guarded transfer itself completed.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::ContentionFailed {
                phase: SemaphorePhase::Release,
                ..
            }
        )
    }

    /// Shorthand for an out-of-range index.
    pub fn invalid_index(kind: IndexKind, index: usize) -> Self {
        Self::InvalidIndex { kind, index }
    }
}
