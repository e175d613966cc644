//! Register transport implementations.
//!
//! - [`ioctl`] - Linux character device of the controller driver
//! - [`simulation`] - In-memory register file for development and testing
//!
//! # Adding New Transports
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `RegisterTransport` from `cio_common::hal::transport`
//! 3. Select it in [`create_transport`]

pub mod ioctl;
pub mod simulation;

use cio_common::hal::config::ControllerConfig;
use cio_common::hal::transport::RegisterTransport;
use tracing::info;

pub use ioctl::IoctlTransport;
pub use simulation::SimulatedTransport;

/// Create the transport selected by the configuration.
pub fn create_transport(config: &ControllerConfig) -> Box<dyn RegisterTransport> {
    let transport: Box<dyn RegisterTransport> = if config.simulate {
        Box::new(SimulatedTransport::new().with_live_timer())
    } else {
        Box::new(IoctlTransport::new())
    };
    info!("Using '{}' register transport", transport.name());
    transport
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulate_flag_selects_transport() {
        let mut config = ControllerConfig::default();
        assert_eq!(create_transport(&config).name(), "ioctl");

        config.simulate = true;
        assert_eq!(create_transport(&config).name(), "simulation");
    }
}
