//! Controller configuration.
//!
//! `ControllerConfig` is loaded from `controller.toml`:
//!
//! ```toml
//! device_path = "/dev/cio0"
//! simulate = false
//! modules = ["outputs_off"]
//!
//! [shared]
//! log_level = "info"
//! service_name = "cio_hal"
//! ```

use crate::config::SharedConfig;
use crate::consts::DEFAULT_DEVICE_PATH;
use crate::hal::error::HalError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Default function for device_path
fn default_device_path() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_PATH)
}

/// Main configuration of one device controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Character device of the controller channel.
    #[serde(default = "default_device_path")]
    pub device_path: PathBuf,

    /// Use the in-memory simulated register file instead of hardware.
    #[serde(default)]
    pub simulate: bool,

    /// Built-in modules loaded after the controller is enabled.
    #[serde(default)]
    pub modules: Vec<String>,

    /// Logging and service identity.
    #[serde(default)]
    pub shared: SharedConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            device_path: default_device_path(),
            simulate: false,
            modules: Vec::new(),
        }
    }
}

impl ControllerConfig {
    /// Validate the controller configuration.
    ///
    /// # Validation Rules
    /// 1. `shared` passes its own validation
    /// 2. `device_path` is not empty
    /// 3. Module names are unique and non-empty
    pub fn validate(&self) -> Result<(), HalError> {
        self.shared
            .validate()
            .map_err(|e| HalError::ConfigError(e.to_string()))?;

        if self.device_path.as_os_str().is_empty() {
            return Err(HalError::ConfigError(
                "device_path cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for module in &self.modules {
            if module.is_empty() {
                return Err(HalError::ConfigError("Empty module name".to_string()));
            }
            if !names.insert(module) {
                return Err(HalError::ConfigError(format!(
                    "Duplicate module name: {}",
                    module
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ControllerConfig::default();
        assert_eq!(config.device_path, PathBuf::from(DEFAULT_DEVICE_PATH));
        assert!(!config.simulate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: ControllerConfig = toml::from_str("simulate = true").unwrap();
        assert!(config.simulate);
        assert_eq!(config.device_path, PathBuf::from(DEFAULT_DEVICE_PATH));
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = toml::from_str::<ControllerConfig>("bogus = 1");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_duplicate_modules() {
        let config = ControllerConfig {
            modules: vec!["outputs_off".into(), "outputs_off".into()],
            ..ControllerConfig::default()
        };
        assert!(matches!(config.validate(), Err(HalError::ConfigError(_))));
    }

    #[test]
    fn rejects_empty_device_path() {
        let config = ControllerConfig {
            device_path: PathBuf::new(),
            ..ControllerConfig::default()
        };
        assert!(matches!(config.validate(), Err(HalError::ConfigError(_))));
    }
}
