//! # Settings Module
//!
//! Caller-supplied OpenDroneMap setting overrides.
//!
//! Overrides are a YAML mapping of engine setting names to values. Every key
//! is passed on except the protected ones; the project path in particular
//! belongs to this run and can't be redirected by an override file.

use crate::error::{InputError, StagingError};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Setting names an override file may not change
pub const PROTECTED_SETTINGS: [&str; 1] = ["project_path"];

/// File name of the sanitized overrides written into a project
pub const OVERRIDES_FILE: &str = "odm_overrides.yaml";

/// Overrides as loaded from the caller's file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOverrides {
    values: Mapping,
}

impl EngineOverrides {
    /// Load overrides from a YAML file
    pub fn load(path: &Path) -> Result<Self, InputError> {
        if !path.exists() {
            return Err(InputError::OverridesNotFound {
                path: path.to_path_buf(),
            });
        }
        let invalid = |reason: String| InputError::InvalidOverrides {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        Self::parse(&text).map_err(invalid)
    }

    /// Parse overrides from YAML text; an empty document means no overrides
    pub fn parse(text: &str) -> Result<Self, String> {
        match serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string())? {
            Value::Null => Ok(Self::default()),
            Value::Mapping(values) => Ok(Self { values }),
            other => Err(format!("expected a mapping, found {:?}", other)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Engine settings for one run, anchored to its project folder
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    project_path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl EngineSettings {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Merge overrides, skipping protected and non-text keys
    ///
    /// Returns how many settings were applied.
    pub fn apply_overrides(&mut self, overrides: &EngineOverrides) -> usize {
        let mut applied = 0;
        for (key, value) in &overrides.values {
            let Some(name) = key.as_str() else {
                warn!(key = ?key, "Skipping configuration value with a non-text name");
                continue;
            };
            if PROTECTED_SETTINGS.contains(&name) {
                warn!("Skipping disallowed configuration value for {}", name);
                continue;
            }
            debug!(name, value = ?value, "Configuration: overriding");
            self.values.insert(name.to_string(), value.clone());
            applied += 1;
        }
        applied
    }

    /// Write the applied overrides as YAML for the engine to read
    pub fn write_overrides(&self, path: &Path) -> Result<(), StagingError> {
        let failed = |reason: String| StagingError::WriteSettings {
            path: path.to_path_buf(),
            reason,
        };
        let text = serde_yaml::to_string(&self.values).map_err(|e| failed(e.to_string()))?;
        fs::write(path, text).map_err(|e| failed(e.to_string()))
    }
}
