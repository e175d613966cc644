//! Configuration groups.
//!
//! A `ConfigGroup` is an ordered list of configuration objects that share one
//! base directory and are parsed or written together. Each object reports its
//! own result; the group reports the aggregate.

use super::{ConfigError, ConfigLoader};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One configuration object inside a [`ConfigGroup`].
pub trait ConfigObject: Any + Send {
    /// File name relative to the group's base directory.
    fn file_name(&self) -> &str;

    /// Parse the object from `base_dir/file_name`.
    fn parse(&mut self, base_dir: &Path) -> Result<(), ConfigError>;

    /// Write the object to `base_dir/file_name`.
    fn write(&self, base_dir: &Path) -> Result<(), ConfigError>;

    /// Downcasting support for typed access after parsing.
    fn as_any(&self) -> &dyn Any;
}

/// A serde-backed TOML configuration file.
#[derive(Debug, Clone, Default)]
pub struct TomlConfig<T> {
    file_name: String,
    /// Current value (default until parsed).
    pub value: T,
}

impl<T: Default> TomlConfig<T> {
    /// Create a config object for `file_name` holding `T::default()`.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            value: T::default(),
        }
    }
}

impl<T> ConfigObject for TomlConfig<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn parse(&mut self, base_dir: &Path) -> Result<(), ConfigError> {
        self.value = T::load(&base_dir.join(&self.file_name))?;
        Ok(())
    }

    fn write(&self, base_dir: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(&self.value)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        fs::write(base_dir.join(&self.file_name), text)
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Result of one object in a group operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectOutcome {
    /// Object file name.
    pub file_name: String,
    /// `None` if the object was skipped after an earlier failure.
    pub result: Option<Result<(), ConfigError>>,
}

impl ObjectOutcome {
    /// Returns `true` if the object was processed successfully.
    pub fn succeeded(&self) -> bool {
        matches!(self.result, Some(Ok(())))
    }
}

/// Aggregate result of a group parse or write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupOutcome {
    /// Per-object outcomes, in group order.
    pub objects: Vec<ObjectOutcome>,
}

impl GroupOutcome {
    /// Returns `true` only if every object succeeded.
    pub fn all_ok(&self) -> bool {
        self.objects.iter().all(ObjectOutcome::succeeded)
    }

    /// Per-object success flags, in group order.
    pub fn succeeded(&self) -> Vec<bool> {
        self.objects.iter().map(ObjectOutcome::succeeded).collect()
    }
}

/// Ordered collection of configuration objects sharing a base directory.
pub struct ConfigGroup {
    base_dir: PathBuf,
    objects: Vec<Box<dyn ConfigObject>>,
}

impl ConfigGroup {
    /// Create an empty group rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            objects: Vec::new(),
        }
    }

    /// Shared base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Append an object; groups are processed in insertion order.
    pub fn push(&mut self, object: Box<dyn ConfigObject>) {
        self.objects.push(object);
    }

    /// Number of objects in the group.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the group holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Typed access to an object by file name.
    pub fn get<T: ConfigObject>(&self, file_name: &str) -> Option<&T> {
        self.objects
            .iter()
            .find(|o| o.file_name() == file_name)
            .and_then(|o| o.as_any().downcast_ref::<T>())
    }

    /// Parse every object. With `continue_on_error` false, objects after the
    /// first failure are skipped.
    pub fn parse_all(&mut self, continue_on_error: bool) -> GroupOutcome {
        let base_dir = self.base_dir.clone();
        run_each(&mut self.objects, continue_on_error, "parse", |o| {
            o.parse(&base_dir)
        })
    }

    /// Write every object. With `continue_on_error` false, objects after the
    /// first failure are skipped.
    pub fn write_all(&mut self, continue_on_error: bool) -> GroupOutcome {
        let base_dir = self.base_dir.clone();
        run_each(&mut self.objects, continue_on_error, "write", |o| {
            o.write(&base_dir)
        })
    }
}

fn run_each(
    objects: &mut [Box<dyn ConfigObject>],
    continue_on_error: bool,
    op: &str,
    mut f: impl FnMut(&mut dyn ConfigObject) -> Result<(), ConfigError>,
) -> GroupOutcome {
    let mut outcome = GroupOutcome::default();
    let mut stopped = false;

    for object in objects.iter_mut() {
        let file_name = object.file_name().to_string();
        if stopped {
            outcome.objects.push(ObjectOutcome {
                file_name,
                result: None,
            });
            continue;
        }

        let result = f(object.as_mut());
        match &result {
            Ok(()) => debug!("Config {} {}: ok", op, file_name),
            Err(e) => {
                warn!("Config {} {} failed: {}", op, file_name, e);
                stopped = !continue_on_error;
            }
        }
        outcome.objects.push(ObjectOutcome {
            file_name,
            result: Some(result),
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedConfig;
    use tempfile::TempDir;

    fn group_with(dir: &Path, names: &[&str]) -> ConfigGroup {
        let mut group = ConfigGroup::new(dir);
        for name in names {
            group.push(Box::new(TomlConfig::<SharedConfig>::new(*name)));
        }
        group
    }

    #[test]
    fn write_then_parse_all() {
        let dir = TempDir::new().unwrap();
        let mut group = group_with(dir.path(), &["a.toml", "b.toml"]);
        assert_eq!(group.len(), 2);

        let written = group.write_all(false);
        assert!(written.all_ok());

        fs::write(
            dir.path().join("b.toml"),
            "log_level = \"warn\"\nservice_name = \"bench-b\"\n",
        )
        .unwrap();

        let parsed = group.parse_all(false);
        assert_eq!(parsed.succeeded(), vec![true, true]);

        let b = group.get::<TomlConfig<SharedConfig>>("b.toml").unwrap();
        assert_eq!(b.value.service_name, "bench-b");
    }

    #[test]
    fn parse_stops_at_first_failure_by_default() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("c.toml"), "service_name = \"c\"\n").unwrap();
        let mut group = group_with(dir.path(), &["missing.toml", "c.toml"]);

        let outcome = group.parse_all(false);
        assert!(!outcome.all_ok());
        assert_eq!(
            outcome.objects[0].result,
            Some(Err(ConfigError::FileNotFound))
        );
        assert_eq!(outcome.objects[1].result, None);
    }

    #[test]
    fn parse_continues_past_failure_when_requested() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("c.toml"), "service_name = \"c\"\n").unwrap();
        let mut group = group_with(dir.path(), &["missing.toml", "c.toml"]);

        let outcome = group.parse_all(true);
        assert!(!outcome.all_ok());
        assert_eq!(outcome.succeeded(), vec![false, true]);
    }

    #[test]
    fn empty_group_is_ok() {
        let mut group = ConfigGroup::new("/nonexistent");
        assert!(group.is_empty());
        assert!(group.parse_all(false).all_ok());
    }
}
