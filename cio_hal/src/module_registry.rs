//! Registry of loadable controller modules.
//!
//! A module is a named pair of entry points: `init` runs when the module is
//! loaded and `exit` runs before it is unloaded. Both receive a
//! [`ModuleContext`] giving access to the controller. The registry keeps the
//! catalog of known modules and the ordered set of loaded ones; it uses
//! constructor-injection rather than global state.

use cio_common::hal::error::HalError;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::controller::DeviceController;

/// Context passed to module entry points.
pub struct ModuleContext<'a> {
    /// Controller the module operates on
    pub controller: &'a DeviceController,
}

/// Module entry point.
pub type ModuleFn = fn(&ModuleContext<'_>) -> Result<(), HalError>;

/// The two required entry points of a module.
#[derive(Debug, Clone, Copy)]
pub struct ModuleEntryPoints {
    /// Called once on load
    pub init: ModuleFn,
    /// Called once before unload
    pub exit: ModuleFn,
}

/// Module registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// No module with that name in the catalog.
    #[error("Module '{0}' not found")]
    NotFound(String),

    /// Module is already loaded.
    #[error("Module '{0}' already loaded")]
    AlreadyLoaded(String),

    /// Module `init` entry point failed; the module is not loaded.
    #[error("Module '{name}' init failed: {source}")]
    InitFailed {
        /// Module name
        name: String,
        /// Error returned by `init`
        source: HalError,
    },

    /// Module is not loaded.
    #[error("Module '{0}' not loaded")]
    NotLoaded(String),

    /// Module `exit` entry point failed; the module is unloaded anyway.
    #[error("Module '{name}' exit failed: {source}")]
    ExitFailed {
        /// Module name
        name: String,
        /// Error returned by `exit`
        source: HalError,
    },
}

impl From<ModuleError> for HalError {
    fn from(e: ModuleError) -> Self {
        HalError::ConfigError(e.to_string())
    }
}

/// Catalog of available modules plus the loaded set, in load order.
pub struct ModuleRegistry {
    catalog: HashMap<&'static str, ModuleEntryPoints>,
    loaded: Vec<&'static str>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            catalog: HashMap::new(),
            loaded: Vec::new(),
        }
    }

    /// Add a module to the catalog.
    ///
    /// # Panics
    /// Panics if a module with the same name is already registered.
    pub fn register(&mut self, name: &'static str, entry_points: ModuleEntryPoints) {
        if self.catalog.contains_key(name) {
            panic!("Module '{name}' is already registered");
        }
        self.catalog.insert(name, entry_points);
    }

    /// List all registered module names.
    pub fn list_modules(&self) -> Vec<&'static str> {
        self.catalog.keys().copied().collect()
    }

    /// Loaded module names, in load order.
    pub fn loaded(&self) -> &[&'static str] {
        &self.loaded
    }

    /// Returns `true` if `name` is loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|n| *n == name)
    }

    /// Load a module and run its `init` entry point.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyLoaded`, or `InitFailed` (the module stays
    /// unloaded).
    pub fn load(&mut self, name: &str, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let (&key, entry) = self
            .catalog
            .get_key_value(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        if self.is_loaded(name) {
            return Err(ModuleError::AlreadyLoaded(name.to_string()));
        }

        (entry.init)(ctx).map_err(|source| {
            warn!("Module '{}' init failed: {}", name, source);
            ModuleError::InitFailed {
                name: name.to_string(),
                source,
            }
        })?;

        self.loaded.push(key);
        info!("Module '{}' loaded", name);
        Ok(())
    }

    /// Run a module's `exit` entry point and unload it.
    ///
    /// # Errors
    /// `NotLoaded`, or `ExitFailed` (the module is unloaded anyway).
    pub fn unload(&mut self, name: &str, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let index = self
            .loaded
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| ModuleError::NotLoaded(name.to_string()))?;
        let key = self.loaded.remove(index);

        // Loaded names always come from the catalog.
        let Some(entry) = self.catalog.get(key) else {
            return Ok(());
        };
        (entry.exit)(ctx).map_err(|source| {
            warn!("Module '{}' exit failed: {}", name, source);
            ModuleError::ExitFailed {
                name: name.to_string(),
                source,
            }
        })?;

        info!("Module '{}' unloaded", name);
        Ok(())
    }

    /// Unload every loaded module in reverse load order. Continues past
    /// failures and returns them.
    pub fn unload_all(&mut self, ctx: &ModuleContext<'_>) -> Vec<ModuleError> {
        let mut errors = Vec::new();
        while let Some(&name) = self.loaded.last() {
            if let Err(e) = self.unload(name, ctx) {
                errors.push(e);
            }
        }
        errors
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SimulatedTransport;
    use crate::lock::ProcessLock;
    use crate::teardown::TeardownRegistry;
    use cio_common::hal::config::ControllerConfig;
    use cio_common::hal::regs::Register;

    fn ok(_: &ModuleContext<'_>) -> Result<(), HalError> {
        Ok(())
    }

    fn fail(_: &ModuleContext<'_>) -> Result<(), HalError> {
        Err(HalError::NotEnabled)
    }

    fn light_on(ctx: &ModuleContext<'_>) -> Result<(), HalError> {
        ctx.controller.set_light_pole(0x01)
    }

    fn light_off(ctx: &ModuleContext<'_>) -> Result<(), HalError> {
        ctx.controller.set_light_pole(0x00)
    }

    const OK: ModuleEntryPoints = ModuleEntryPoints { init: ok, exit: ok };

    fn controller() -> (DeviceController, SimulatedTransport) {
        let sim = SimulatedTransport::new();
        let controller = DeviceController::with_runtime(
            &ControllerConfig::default(),
            Box::new(sim.clone()),
            ProcessLock::new(),
            &TeardownRegistry::new(),
        );
        (controller, sim)
    }

    #[test]
    fn load_runs_init_and_unload_runs_exit() {
        let (controller, sim) = controller();
        let ctx = ModuleContext {
            controller: &controller,
        };
        let mut reg = ModuleRegistry::new();
        reg.register(
            "light",
            ModuleEntryPoints {
                init: light_on,
                exit: light_off,
            },
        );

        reg.load("light", &ctx).unwrap();
        assert!(reg.is_loaded("light"));
        assert_eq!(sim.register_byte(Register::LightPole), 0x01);

        reg.unload("light", &ctx).unwrap();
        assert!(!reg.is_loaded("light"));
        assert_eq!(sim.register_byte(Register::LightPole), 0x00);
    }

    #[test]
    fn load_errors_are_explicit() {
        let (controller, _sim) = controller();
        let ctx = ModuleContext {
            controller: &controller,
        };
        let mut reg = ModuleRegistry::new();
        reg.register("ok", OK);
        reg.register(
            "broken",
            ModuleEntryPoints {
                init: fail,
                exit: ok,
            },
        );

        assert_eq!(
            reg.load("missing", &ctx),
            Err(ModuleError::NotFound("missing".to_string()))
        );
        reg.load("ok", &ctx).unwrap();
        assert_eq!(
            reg.load("ok", &ctx),
            Err(ModuleError::AlreadyLoaded("ok".to_string()))
        );
        assert!(matches!(
            reg.load("broken", &ctx),
            Err(ModuleError::InitFailed { .. })
        ));
        assert!(!reg.is_loaded("broken"));
        assert_eq!(
            reg.unload("broken", &ctx),
            Err(ModuleError::NotLoaded("broken".to_string()))
        );
    }

    #[test]
    fn exit_failure_still_unloads() {
        let (controller, _sim) = controller();
        let ctx = ModuleContext {
            controller: &controller,
        };
        let mut reg = ModuleRegistry::new();
        reg.register(
            "sticky",
            ModuleEntryPoints {
                init: ok,
                exit: fail,
            },
        );
        reg.load("sticky", &ctx).unwrap();
        assert!(matches!(
            reg.unload("sticky", &ctx),
            Err(ModuleError::ExitFailed { .. })
        ));
        assert!(!reg.is_loaded("sticky"));
    }

    #[test]
    fn unload_all_reverses_load_order() {
        let (controller, _sim) = controller();
        let ctx = ModuleContext {
            controller: &controller,
        };
        let mut reg = ModuleRegistry::new();
        reg.register("a", OK);
        reg.register(
            "b",
            ModuleEntryPoints {
                init: ok,
                exit: fail,
            },
        );
        reg.register("c", OK);
        for name in ["a", "b", "c"] {
            reg.load(name, &ctx).unwrap();
        }
        assert_eq!(reg.loaded(), &["a", "b", "c"]);

        let errors = reg.unload_all(&ctx);
        assert_eq!(errors.len(), 1);
        assert!(reg.loaded().is_empty());
    }

    #[test]
    fn registry_list_modules() {
        let mut reg = ModuleRegistry::new();
        reg.register("alpha", OK);
        reg.register("beta", OK);

        let mut names = reg.list_modules();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = ModuleRegistry::new();
        reg.register("dup", OK);
        reg.register("dup", OK);
    }
}
