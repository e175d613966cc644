//! Built-in controller modules.
//!
//! | Name              | init                              | exit                      |
//! |-------------------|-----------------------------------|---------------------------|
//! | `identity_report` | log firmware identity and status  | -                         |
//! | `outputs_off`     | -                                 | clear digital output banks |

use cio_common::hal::error::HalError;
use tracing::info;

use crate::module_registry::{ModuleContext, ModuleEntryPoints, ModuleRegistry};

fn noop(_: &ModuleContext<'_>) -> Result<(), HalError> {
    Ok(())
}

fn identity_report_init(ctx: &ModuleContext<'_>) -> Result<(), HalError> {
    let identity = ctx.controller.identity().ok_or(HalError::NotEnabled)?;
    info!(
        "Controller {:?}: {} | power status {:#04x}/{:#04x} | motion power {:#04x}",
        ctx.controller.device_path(),
        identity,
        ctx.controller.power_status_1()?,
        ctx.controller.power_status_2()?,
        ctx.controller.motion_power_status()?,
    );
    Ok(())
}

fn outputs_off_exit(ctx: &ModuleContext<'_>) -> Result<(), HalError> {
    for bank in [2, 3] {
        ctx.controller.set_bank_outputs(bank, 0)?;
    }
    info!("Digital outputs cleared");
    Ok(())
}

/// Register every built-in module.
pub fn register_builtin_modules(registry: &mut ModuleRegistry) {
    registry.register(
        "identity_report",
        ModuleEntryPoints {
            init: identity_report_init,
            exit: noop,
        },
    );
    registry.register(
        "outputs_off",
        ModuleEntryPoints {
            init: noop,
            exit: outputs_off_exit,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::DeviceController;
    use crate::drivers::SimulatedTransport;
    use crate::lock::ProcessLock;
    use crate::teardown::TeardownRegistry;
    use cio_common::hal::config::ControllerConfig;
    use cio_common::hal::regs::Register;

    #[test]
    fn builtins_registered() {
        let mut reg = ModuleRegistry::new();
        register_builtin_modules(&mut reg);
        let mut names = reg.list_modules();
        names.sort();
        assert_eq!(names, vec!["identity_report", "outputs_off"]);
    }

    #[test]
    fn outputs_off_clears_banks_on_unload() {
        let sim = SimulatedTransport::new();
        let controller = DeviceController::with_runtime(
            &ControllerConfig::default(),
            Box::new(sim.clone()),
            ProcessLock::new(),
            &TeardownRegistry::new(),
        );
        let ctx = ModuleContext {
            controller: &controller,
        };
        let mut reg = ModuleRegistry::new();
        register_builtin_modules(&mut reg);

        reg.load("identity_report", &ctx).unwrap();
        reg.load("outputs_off", &ctx).unwrap();
        controller.set_bank_outputs(2, 0xFF).unwrap();
        controller.set_bank_outputs(3, 0x0F).unwrap();

        assert!(reg.unload_all(&ctx).is_empty());
        assert_eq!(sim.register_byte(Register::DoControl1), 0);
        assert_eq!(sim.register_byte(Register::DoControl2), 0);
        assert_eq!(controller.shadow_outputs(3), Ok(0));
    }
}
