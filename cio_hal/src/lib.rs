//! # CIO HAL Library
//!
//! Register access and arbitration layer for the robot core I/O controller.
//!
//! Every operation is a blocking round trip through a
//! [`RegisterTransport`](cio_common::hal::transport::RegisterTransport); there
//! is no register cache and no internal thread.
//!
//! # Module Structure
//!
//! - [`drivers`] - Transport implementations (ioctl device, simulation)
//! - [`handle`] - Device handle: open channel, enablement, transactions
//! - [`controller`] - Device controller: lifecycle and named accessors
//! - [`bank`] - Digital and power bank abstraction
//! - [`semaphore`] - Semaphore-guarded analog block transfers
//! - [`lock`] - Process-wide lock shared by all controllers
//! - [`teardown`] - Shutdown hook registry
//! - [`module_registry`] - Loadable module catalog
//! - [`modules`] - Built-in modules
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        DeviceController                          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ named regs   │   │ bank layer   │   │ semaphore transfers  │  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────┬───────────┘  │
//! │         └──────────────────┼──────────────────────┘              │
//! │                            ▼                                     │
//! │                   ┌────────────────┐      ┌──────────────────┐   │
//! │                   │  DeviceHandle  │      │  ProcessLock     │   │
//! │                   └───────┬────────┘      │  (process-wide)  │   │
//! │                           ▼               └──────────────────┘   │
//! │                   ┌────────────────┐                             │
//! │                   │ RegisterTransport (ioctl | simulation)       │
//! │                   └────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod bank;
pub mod controller;
pub mod drivers;
pub mod handle;
pub mod lock;
pub mod module_registry;
pub mod modules;
pub mod semaphore;
pub mod teardown;

// Re-export key types for convenience
pub use crate::controller::DeviceController;
pub use crate::lock::{ProcessLock, ProcessLockGuard};
pub use crate::module_registry::{ModuleContext, ModuleEntryPoints, ModuleError, ModuleRegistry};
pub use crate::semaphore::GuardedTransfer;
pub use crate::teardown::TeardownRegistry;
