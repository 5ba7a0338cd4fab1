use crate::error::BootstrapError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const DEBUG_KEY: &str = "debug";
const MODULES_DIRECTORY_KEY: &str = "modulesDirectory";

/// Parsed contents of `config.json`.
///
/// Arbitrary keys are preserved; only `debug` and `modulesDirectory` have a
/// meaning to the startup pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    /// Parses settings text read from `path`.
    pub fn parse(path: &Path, text: &str) -> Result<Self, BootstrapError> {
        let document: Value =
            serde_json::from_str(text).map_err(|source| BootstrapError::ParseSettings {
                path: path.to_path_buf(),
                source,
            })?;

        let Value::Object(values) = document else {
            return Err(BootstrapError::SettingsNotObject {
                path: path.to_path_buf(),
            });
        };

        let invalid = |reason: &str| BootstrapError::InvalidSettings {
            path: path.to_path_buf(),
            reason: reason.to_owned(),
        };
        match values.get(DEBUG_KEY) {
            None | Some(Value::Bool(_)) => {}
            Some(_) => return Err(invalid("'debug' must be a boolean")),
        }
        match values.get(MODULES_DIRECTORY_KEY) {
            None | Some(Value::String(_)) => {}
            Some(_) => return Err(invalid("'modulesDirectory' must be a string")),
        }

        Ok(Self { values })
    }

    /// Whether developer tools should be opened. Absent means `false`.
    pub fn debug(&self) -> bool {
        self.values
            .get(DEBUG_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Optional override of the modules directory. Relative paths resolve
    /// against `config_dir`.
    pub fn modules_directory(&self, config_dir: &Path) -> Option<PathBuf> {
        let raw = self.values.get(MODULES_DIRECTORY_KEY)?.as_str()?.trim();
        if raw.is_empty() {
            return None;
        }
        let path = Path::new(raw);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}
