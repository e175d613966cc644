//! Controller configuration loading and config-group tests.
//!
//! Covers `ControllerConfig` defaults, unknown-field rejection, validation,
//! and a mixed `ConfigGroup` holding controller and shared configs.

use cio_common::config::group::{ConfigGroup, TomlConfig};
use cio_common::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
use cio_common::consts::DEFAULT_DEVICE_PATH;
use cio_common::hal::config::ControllerConfig;
use cio_common::hal::error::HalError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write `content` to `dir/name` and return the path.
fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn full_controller_config_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "controller.toml",
        r#"
device_path = "/dev/cio1"
simulate = true
modules = ["identity_report", "outputs_off"]

[shared]
log_level = "debug"
service_name = "cio-bench"
"#,
    );

    let config = ControllerConfig::load(&path).unwrap();
    assert_eq!(config.device_path, PathBuf::from("/dev/cio1"));
    assert!(config.simulate);
    assert_eq!(config.modules, vec!["identity_report", "outputs_off"]);
    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.shared.service_name, "cio-bench");
    assert!(config.validate().is_ok());
}

#[test]
fn empty_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "controller.toml", "");

    let config = ControllerConfig::load(&path).unwrap();
    assert_eq!(config.device_path, PathBuf::from(DEFAULT_DEVICE_PATH));
    assert!(!config.simulate);
    assert!(config.modules.is_empty());
    assert_eq!(config.shared, SharedConfig::default());
}

#[test]
fn unknown_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "controller.toml", "device = \"/dev/cio0\"\n");
    assert!(matches!(
        ControllerConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        ControllerConfig::load(&dir.path().join("absent.toml")).unwrap_err(),
        ConfigError::FileNotFound
    );
}

#[test]
fn duplicate_modules_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "controller.toml",
        "modules = [\"outputs_off\", \"outputs_off\"]\n",
    );
    let config = ControllerConfig::load(&path).unwrap();
    assert!(matches!(config.validate(), Err(HalError::ConfigError(_))));
}

#[test]
fn group_round_trips_mixed_objects() {
    let dir = TempDir::new().unwrap();
    let mut group = ConfigGroup::new(dir.path());

    let mut controller = TomlConfig::<ControllerConfig>::new("controller.toml");
    controller.value.simulate = true;
    controller.value.modules.push("outputs_off".to_string());
    group.push(Box::new(controller));
    group.push(Box::new(TomlConfig::<SharedConfig>::new("shared.toml")));

    assert!(group.write_all(false).all_ok());

    let mut reread = ConfigGroup::new(dir.path());
    reread.push(Box::new(TomlConfig::<ControllerConfig>::new("controller.toml")));
    reread.push(Box::new(TomlConfig::<SharedConfig>::new("shared.toml")));
    let outcome = reread.parse_all(false);
    assert_eq!(outcome.succeeded(), vec![true, true]);

    let controller = reread
        .get::<TomlConfig<ControllerConfig>>("controller.toml")
        .unwrap();
    assert!(controller.value.simulate);
    assert_eq!(controller.value.modules, vec!["outputs_off"]);
}

#[test]
fn group_continues_past_failures_on_request() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "broken.toml", "simulate = \"yes\"\n");
    write_file(dir.path(), "good.toml", "simulate = true\n");

    let build = || {
        let mut group = ConfigGroup::new(dir.path());
        group.push(Box::new(TomlConfig::<ControllerConfig>::new("missing.toml")));
        group.push(Box::new(TomlConfig::<ControllerConfig>::new("broken.toml")));
        group.push(Box::new(TomlConfig::<ControllerConfig>::new("good.toml")));
        group
    };

    let outcome = build().parse_all(true);
    assert!(!outcome.all_ok());
    assert_eq!(outcome.succeeded(), vec![false, false, true]);
    assert_eq!(
        outcome.objects[0].result,
        Some(Err(ConfigError::FileNotFound))
    );

    let outcome = build().parse_all(false);
    assert_eq!(outcome.succeeded(), vec![false, false, false]);
    assert_eq!(outcome.objects[1].result, None);
    assert_eq!(outcome.objects[2].result, None);
}
