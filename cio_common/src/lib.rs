//! CIO Common Library
//!
//! This crate provides the shared register map, error types and configuration
//! loading utilities for all crates of the core I/O controller workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Workspace-wide constants (paths, counts, scales)
//! - [`hal`] - Register map, transport trait, error and value types
//! - [`config`] - Configuration loading traits, types and config groups
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cio_common::hal::regs::Register;
//!
//! assert_eq!(Register::Version.width().bytes(), 4);
//! assert_eq!("di_monitor_1".parse::<Register>(), Ok(Register::DiMonitor1));
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
