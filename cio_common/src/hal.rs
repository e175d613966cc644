//! Hardware abstraction layer types shared across the workspace.
//!
//! - [`regs`] - Register codes, widths and the address map
//! - [`transport`] - The `RegisterTransport` trait implemented by backends
//! - [`error`] - `HalError` and its classification enums
//! - [`types`] - Firmware identity, bank direction, analog blocks
//! - [`config`] - Controller configuration loaded from TOML

pub mod config;
pub mod error;
pub mod regs;
pub mod transport;
pub mod types;
