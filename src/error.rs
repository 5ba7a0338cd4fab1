//! Fatal error taxonomy for the startup pipeline.
//!
//! Every variant halts the pipeline. Per-module problems never surface here;
//! they are contained in [`crate::modules::SkipReason`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum BootstrapError {
    HomeUnresolved,
    CreateConfigDir { path: PathBuf, source: io::Error },
    SeedSettings { path: PathBuf, source: io::Error },
    ReadSettings { path: PathBuf, source: io::Error },
    ParseSettings { path: PathBuf, source: serde_json::Error },
    SettingsNotObject { path: PathBuf },
    InvalidSettings { path: PathBuf, reason: String },
    SettingsMissingAfterSeed { path: PathBuf },
    ListModules { path: PathBuf, source: io::Error },
    SeedModules { path: PathBuf, source: io::Error },
    ModulesMissingAfterSeed { path: PathBuf },
    Cancelled,
}

impl BootstrapError {
    /// Path the failing operation was working on, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            BootstrapError::HomeUnresolved | BootstrapError::Cancelled => None,
            BootstrapError::CreateConfigDir { path, .. }
            | BootstrapError::SeedSettings { path, .. }
            | BootstrapError::ReadSettings { path, .. }
            | BootstrapError::ParseSettings { path, .. }
            | BootstrapError::SettingsNotObject { path }
            | BootstrapError::InvalidSettings { path, .. }
            | BootstrapError::SettingsMissingAfterSeed { path }
            | BootstrapError::ListModules { path, .. }
            | BootstrapError::SeedModules { path, .. }
            | BootstrapError::ModulesMissingAfterSeed { path } => Some(path),
        }
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::HomeUnresolved => {
                write!(f, "no home directory found in HOME, HOMEPATH or USERPROFILE")
            }
            BootstrapError::CreateConfigDir { path, .. } => {
                write!(f, "could not create directory '{}'", path.display())
            }
            BootstrapError::SeedSettings { path, .. } => {
                write!(f, "could not copy default configuration to '{}'", path.display())
            }
            BootstrapError::ReadSettings { path, .. } => {
                write!(f, "could not read settings file '{}'", path.display())
            }
            BootstrapError::ParseSettings { path, .. } => {
                write!(f, "settings file '{}' is not valid JSON", path.display())
            }
            BootstrapError::SettingsNotObject { path } => {
                write!(f, "settings file '{}' must contain a JSON object", path.display())
            }
            BootstrapError::InvalidSettings { path, reason } => {
                write!(f, "settings file '{}' is invalid: {reason}", path.display())
            }
            BootstrapError::SettingsMissingAfterSeed { path } => write!(
                f,
                "settings file '{}' is still missing after seeding defaults",
                path.display()
            ),
            BootstrapError::ListModules { path, .. } => {
                write!(f, "could not read module directory '{}'", path.display())
            }
            BootstrapError::SeedModules { path, .. } => write!(
                f,
                "could not copy default module directory to '{}'",
                path.display()
            ),
            BootstrapError::ModulesMissingAfterSeed { path } => write!(
                f,
                "module directory '{}' is still missing after seeding defaults",
                path.display()
            ),
            BootstrapError::Cancelled => write!(f, "bootstrap cancelled before completion"),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootstrapError::CreateConfigDir { source, .. }
            | BootstrapError::SeedSettings { source, .. }
            | BootstrapError::ReadSettings { source, .. }
            | BootstrapError::ListModules { source, .. }
            | BootstrapError::SeedModules { source, .. } => Some(source),
            BootstrapError::ParseSettings { source, .. } => Some(source),
            _ => None,
        }
    }
}
