use crate::defaults::{DefaultsSeeder, FsDefaultsSeeder};
use crate::error::BootstrapError;
use crate::runtime::config::BootstrapConfig;
use crate::runtime::logger::{LogLevel, Logger};
use crate::runtime::telemetry::Telemetry;
use crate::settings::values::Settings;
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Ensures the configuration directory exists and loads `config.json` from it,
/// seeding both from the bundled defaults on first run.
pub struct SettingsStore {
    file_name: String,
    default_settings: PathBuf,
    seeder: Arc<dyn DefaultsSeeder>,
    logger: Arc<Logger>,
    telemetry: Arc<Telemetry>,
}

impl SettingsStore {
    pub fn new(config: &BootstrapConfig, logger: Arc<Logger>, telemetry: Arc<Telemetry>) -> Self {
        Self {
            file_name: config.settings_file_name().to_owned(),
            default_settings: config.default_settings_file(),
            seeder: Arc::new(FsDefaultsSeeder),
            logger,
            telemetry,
        }
    }

    pub fn with_seeder(mut self, seeder: Arc<dyn DefaultsSeeder>) -> Self {
        self.seeder = seeder;
        self
    }

    /// Runs ensure-dir, seed-if-created and read in strict sequence.
    ///
    /// A missing settings file in an existing directory is seeded once and read
    /// again; if it is still missing the error is fatal.
    pub async fn bootstrap(&self, base_dir: &Path) -> Result<Settings, BootstrapError> {
        let settings_path = base_dir.join(&self.file_name);

        if self.ensure_dir(base_dir).await? {
            self.seed(&settings_path).await?;
            self.logger.warn("Created Specular directory and configuration.");
        }

        let text = match fs::read_to_string(&settings_path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.logger
                    .warn("No config found in existing folder, copying default config.");
                self.seed(&settings_path).await?;
                match fs::read_to_string(&settings_path).await {
                    Ok(text) => text,
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        return Err(BootstrapError::SettingsMissingAfterSeed {
                            path: settings_path,
                        });
                    }
                    Err(source) => {
                        return Err(BootstrapError::ReadSettings {
                            path: settings_path,
                            source,
                        });
                    }
                }
            }
            Err(source) => {
                return Err(BootstrapError::ReadSettings {
                    path: settings_path,
                    source,
                });
            }
        };

        let settings = Settings::parse(&settings_path, &text)?;
        let detail = json!({
            "path": settings_path.display().to_string(),
            "keys": settings.as_map().len(),
        });
        self.logger
            .log(LogLevel::Debug, "Loaded settings.", Some(&detail));
        Ok(settings)
    }

    /// Returns `true` when the directory was created by this call.
    async fn ensure_dir(&self, dir: &Path) -> Result<bool, BootstrapError> {
        match fs::create_dir(dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(source) => Err(BootstrapError::CreateConfigDir {
                path: dir.to_path_buf(),
                source,
            }),
        }
    }

    /// Copies the bundled settings file to `destination`. Completes before returning.
    async fn seed(&self, destination: &Path) -> Result<(), BootstrapError> {
        self.seeder
            .seed_file(&self.default_settings, destination)
            .await
            .map_err(|source| BootstrapError::SeedSettings {
                path: destination.to_path_buf(),
                source,
            })?;
        self.telemetry.record_defaults_seeded();
        tracing::debug!(
            from = %self.default_settings.display(),
            to = %destination.display(),
            "seeded default settings"
        );
        Ok(())
    }
}
