//! Prelude module for common re-exports.
//!
//! ```rust
//! use cio_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::group::{ConfigGroup, ConfigObject, GroupOutcome, TomlConfig};
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::ControllerConfig;

// ─── Registers & Transport ──────────────────────────────────────────
pub use crate::hal::regs::{Register, RegisterWidth};
pub use crate::hal::transport::{Payload, RegisterTransport};

// ─── Errors & Values ────────────────────────────────────────────────
pub use crate::hal::error::{Access, HalError, IndexKind, SemaphorePhase};
pub use crate::hal::types::{AnalogBlock, AnalogSample, BankDirection, FirmwareIdentity};
