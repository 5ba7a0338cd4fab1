use crate::error::BootstrapError;
use crate::runtime::logger::DEFAULT_HISTORY_CAPACITY;
use anyhow::{bail, Context, Result};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_APP_DIR_NAME: &str = ".specular-mirror";
pub const DEFAULT_SETTINGS_FILE_NAME: &str = "config.json";
pub const DEFAULT_MODULES_DIR_NAME: &str = "modules";
pub const DEFAULT_MANIFEST_FILE_NAME: &str = "manifest.json";
/// Bundled defaults, relative to the working directory the shell starts in.
pub const DEFAULT_DEFAULTS_DIR: &str = "app/default";
const DEFAULT_MANIFEST_READ_TIMEOUT_SECS: u64 = 5;
const DEFAULT_READY_DISPLAY_DELAY_MS: u64 = 1_000;

/// Environment variables consulted, in order, for the home directory.
pub const HOME_ENV_VARS: [&str; 3] = ["HOME", "HOMEPATH", "USERPROFILE"];

/// Looks up one environment variable.
pub(crate) type EnvLookup = fn(&str) -> Option<OsString>;

pub(crate) fn process_env(name: &str) -> Option<OsString> {
    env::var_os(name)
}

/// Runtime configuration for the startup pipeline.
///
/// All instances must be constructed via [`BootstrapConfig::builder`] or
/// [`BootstrapConfig::new`] so invariants are validated before any consumer
/// observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    home_dir: Option<PathBuf>,
    app_dir_name: String,
    settings_file_name: String,
    modules_dir_name: String,
    manifest_file_name: String,
    defaults_dir: PathBuf,
    manifest_read_timeout: Duration,
    ready_display_delay: Duration,
    log_history_capacity: usize,
}

pub struct BootstrapConfigParams {
    pub home_dir: Option<PathBuf>,
    pub app_dir_name: String,
    pub settings_file_name: String,
    pub modules_dir_name: String,
    pub manifest_file_name: String,
    pub defaults_dir: PathBuf,
    pub manifest_read_timeout: Duration,
    pub ready_display_delay: Duration,
    pub log_history_capacity: usize,
}

impl BootstrapConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> BootstrapConfigBuilder {
        BootstrapConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: BootstrapConfigParams) -> Result<Self> {
        let BootstrapConfigParams {
            home_dir,
            app_dir_name,
            settings_file_name,
            modules_dir_name,
            manifest_file_name,
            defaults_dir,
            manifest_read_timeout,
            ready_display_delay,
            log_history_capacity,
        } = params;

        let config = Self {
            home_dir,
            app_dir_name: trimmed_string(app_dir_name),
            settings_file_name: trimmed_string(settings_file_name),
            modules_dir_name: trimmed_string(modules_dir_name),
            manifest_file_name: trimmed_string(manifest_file_name),
            defaults_dir,
            manifest_read_timeout,
            ready_display_delay,
            log_history_capacity,
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration for the current user: home from the environment, bundled
    /// defaults under the working directory.
    pub fn from_env() -> Result<Self> {
        let cwd = env::current_dir().context("failed to resolve the working directory")?;
        let mut builder = Self::builder().defaults_dir(cwd.join(DEFAULT_DEFAULTS_DIR));
        if let Some(home) = home_from_env() {
            builder = builder.home_dir(home);
        }
        builder.build()
    }

    /// Explicit home directory, if one was configured.
    pub fn home_dir(&self) -> Option<&Path> {
        self.home_dir.as_deref()
    }

    /// Configured home directory, falling back to the environment.
    pub fn resolve_home(&self) -> Result<PathBuf, BootstrapError> {
        self.resolve_home_with(process_env)
    }

    pub(crate) fn resolve_home_with(&self, lookup: EnvLookup) -> Result<PathBuf, BootstrapError> {
        self.home_dir
            .clone()
            .or_else(|| home_from_lookup(lookup))
            .ok_or(BootstrapError::HomeUnresolved)
    }

    /// `<home>/<app_dir_name>`.
    pub fn config_dir(&self, home: &Path) -> PathBuf {
        home.join(&self.app_dir_name)
    }

    pub fn app_dir_name(&self) -> &str {
        &self.app_dir_name
    }

    pub fn settings_file_name(&self) -> &str {
        &self.settings_file_name
    }

    pub fn modules_dir_name(&self) -> &str {
        &self.modules_dir_name
    }

    pub fn manifest_file_name(&self) -> &str {
        &self.manifest_file_name
    }

    /// Directory holding the bundled `config.json` and `modules/` tree.
    pub fn defaults_dir(&self) -> &Path {
        &self.defaults_dir
    }

    pub fn default_settings_file(&self) -> PathBuf {
        self.defaults_dir.join(&self.settings_file_name)
    }

    pub fn default_modules_dir(&self) -> PathBuf {
        self.defaults_dir.join(&self.modules_dir_name)
    }

    /// Upper bound for reading a single module manifest.
    pub fn manifest_read_timeout(&self) -> Duration {
        self.manifest_read_timeout
    }

    /// How long the full loading bar stays visible before `ready` is signalled.
    pub fn ready_display_delay(&self) -> Duration {
        self.ready_display_delay
    }

    pub fn log_history_capacity(&self) -> usize {
        self.log_history_capacity
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        ensure_file_name(&self.app_dir_name, "app_dir_name")?;
        ensure_file_name(&self.settings_file_name, "settings_file_name")?;
        ensure_file_name(&self.modules_dir_name, "modules_dir_name")?;
        ensure_file_name(&self.manifest_file_name, "manifest_file_name")?;

        if self.defaults_dir.as_os_str().is_empty() {
            bail!("defaults_dir cannot be empty");
        }

        if let Some(home) = &self.home_dir {
            if home.as_os_str().is_empty() {
                bail!("home_dir cannot be empty");
            }
        }

        if self.manifest_read_timeout.is_zero() {
            bail!("manifest_read_timeout must be greater than 0");
        }

        if self.log_history_capacity == 0 {
            bail!("log_history_capacity must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct BootstrapConfigBuilder {
    home_dir: Option<PathBuf>,
    app_dir_name: Option<String>,
    settings_file_name: Option<String>,
    modules_dir_name: Option<String>,
    manifest_file_name: Option<String>,
    defaults_dir: Option<PathBuf>,
    manifest_read_timeout: Option<Duration>,
    ready_display_delay: Option<Duration>,
    log_history_capacity: Option<usize>,
}

impl BootstrapConfigBuilder {
    pub fn home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    pub fn app_dir_name(mut self, name: impl Into<String>) -> Self {
        self.app_dir_name = Some(name.into());
        self
    }

    pub fn settings_file_name(mut self, name: impl Into<String>) -> Self {
        self.settings_file_name = Some(name.into());
        self
    }

    pub fn modules_dir_name(mut self, name: impl Into<String>) -> Self {
        self.modules_dir_name = Some(name.into());
        self
    }

    pub fn manifest_file_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_file_name = Some(name.into());
        self
    }

    pub fn defaults_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.defaults_dir = Some(dir.into());
        self
    }

    pub fn manifest_read_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_read_timeout = Some(timeout);
        self
    }

    pub fn ready_display_delay(mut self, delay: Duration) -> Self {
        self.ready_display_delay = Some(delay);
        self
    }

    pub fn log_history_capacity(mut self, lines: usize) -> Self {
        self.log_history_capacity = Some(lines);
        self
    }

    pub fn build(self) -> Result<BootstrapConfig> {
        let params = BootstrapConfigParams {
            home_dir: self.home_dir,
            app_dir_name: self
                .app_dir_name
                .unwrap_or_else(|| DEFAULT_APP_DIR_NAME.to_owned()),
            settings_file_name: self
                .settings_file_name
                .unwrap_or_else(|| DEFAULT_SETTINGS_FILE_NAME.to_owned()),
            modules_dir_name: self
                .modules_dir_name
                .unwrap_or_else(|| DEFAULT_MODULES_DIR_NAME.to_owned()),
            manifest_file_name: self
                .manifest_file_name
                .unwrap_or_else(|| DEFAULT_MANIFEST_FILE_NAME.to_owned()),
            defaults_dir: self.defaults_dir.context("defaults_dir is required")?,
            manifest_read_timeout: self
                .manifest_read_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_MANIFEST_READ_TIMEOUT_SECS)),
            ready_display_delay: self
                .ready_display_delay
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_READY_DISPLAY_DELAY_MS)),
            log_history_capacity: self
                .log_history_capacity
                .unwrap_or(DEFAULT_HISTORY_CAPACITY),
        };

        BootstrapConfig::new(params)
    }
}

/// First non-empty value among [`HOME_ENV_VARS`].
pub fn home_from_env() -> Option<PathBuf> {
    home_from_lookup(process_env)
}

fn home_from_lookup(lookup: EnvLookup) -> Option<PathBuf> {
    HOME_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn ensure_file_name(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        bail!("{field} must be a single path component, got '{value}'");
    }
    Ok(())
}
