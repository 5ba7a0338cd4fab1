use crate::error::BootstrapError;
use crate::modules::{
    DiscoveryProgress, DiscoveryReport, FsManifestSource, ManifestSource, ModuleDiscovery,
};
use crate::runtime::config::{process_env, BootstrapConfig, EnvLookup};
use crate::runtime::fatal::{CrashReport, FatalErrorHandler};
use crate::runtime::logger::{LogLevel, Logger};
use crate::runtime::progress::{budget, ProgressAccumulator};
use crate::runtime::reporter::UiReporter;
use crate::runtime::telemetry::{Telemetry, TelemetrySnapshot};
use crate::settings::{Settings, SettingsStore};
use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything the shell needs once startup reached "ready".
#[derive(Debug, Clone)]
pub struct BootReport {
    pub version: &'static str,
    pub config_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub settings: Settings,
    /// Whether the shell should open developer tools.
    pub devtools: bool,
    pub modules: DiscoveryReport,
    pub telemetry: TelemetrySnapshot,
}

/// Sequences settings bootstrap and module discovery, reporting progress and
/// routing fatal failures through the [`Logger`].
pub struct Bootstrap<S: ManifestSource = FsManifestSource> {
    config: BootstrapConfig,
    shutdown: CancellationToken,
    logger: Arc<Logger>,
    telemetry: Arc<Telemetry>,
    progress: Arc<ProgressAccumulator>,
    settings: SettingsStore,
    discovery: ModuleDiscovery<S>,
    env_lookup: EnvLookup,
}

impl Bootstrap {
    pub fn new(config: BootstrapConfig, reporter: Arc<dyn UiReporter>) -> Self {
        Self::with_source(config, reporter, FsManifestSource)
    }
}

impl<S: ManifestSource> Bootstrap<S> {
    /// Builds a bootstrap whose discovery reads manifests through `source`.
    pub fn with_source(config: BootstrapConfig, reporter: Arc<dyn UiReporter>, source: S) -> Self {
        let shutdown = CancellationToken::new();
        let fatal = FatalErrorHandler::new(shutdown.clone());
        let logger = Arc::new(Logger::new(config.log_history_capacity(), fatal));
        let telemetry = Arc::new(Telemetry::default());
        let progress = Arc::new(ProgressAccumulator::new(
            reporter,
            config.ready_display_delay(),
        ));
        let settings = SettingsStore::new(&config, logger.clone(), telemetry.clone());
        let discovery =
            ModuleDiscovery::with_source(&config, source, logger.clone(), telemetry.clone());

        Self {
            config,
            shutdown,
            logger,
            telemetry,
            progress,
            settings,
            discovery,
            env_lookup: process_env,
        }
    }

    #[cfg(test)]
    fn with_env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env_lookup = lookup;
        self
    }

    /// Returns a clone of the root token. Cancelling it stops the pipeline before
    /// `ready`; a critical failure cancels it as well.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn logger(&self) -> Arc<Logger> {
        self.logger.clone()
    }

    pub fn progress(&self) -> Arc<ProgressAccumulator> {
        self.progress.clone()
    }

    pub fn crash_report(&self) -> Option<CrashReport> {
        self.logger.crash_report()
    }

    /// Runs the whole startup sequence once.
    ///
    /// On failure the error has already been logged at `critical` and `ready`
    /// is never signalled.
    pub async fn run(&self) -> Result<BootReport> {
        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(BootstrapError::Cancelled),
            outcome = self.boot() => outcome,
        };

        match outcome {
            Ok(report) => {
                self.progress.finish().await;
                Ok(report)
            }
            Err(BootstrapError::Cancelled) => {
                self.logger.warn("Startup cancelled before the mirror was ready.");
                Err(BootstrapError::Cancelled.into())
            }
            Err(err) => {
                let detail = json!({
                    "error": error_chain(&err),
                    "path": err.path().map(|path| path.display().to_string()),
                });
                self.logger.critical(&err.to_string(), Some(&detail));
                Err(err.into())
            }
        }
    }

    async fn boot(&self) -> Result<BootReport, BootstrapError> {
        self.logger
            .info("Dependencies included, loading configuration.");
        self.progress.advance(budget::LOADING_SHOWN);

        let home = self.config.resolve_home_with(self.env_lookup)?;
        let config_dir = self.config.config_dir(&home);
        let settings = self.settings.bootstrap(&config_dir).await?;
        self.progress.advance(budget::SETTINGS_READY);

        let devtools = settings.debug();
        if devtools {
            self.logger.debug("Developer tools are enabled.");
        }
        self.progress.advance(budget::DEVTOOLS_DECIDED);

        let modules_dir = settings
            .modules_directory(&config_dir)
            .unwrap_or_else(|| config_dir.join(self.config.modules_dir_name()));
        self.logger.info("Including enabled modules.");
        let discovery_progress = DiscoveryProgress::new(self.progress.clone(), budget::MODULES)
            .with_shutdown(self.shutdown.clone());
        let modules = self
            .discovery
            .discover(&modules_dir, Some(&discovery_progress))
            .await?;

        self.logger.log(
            LogLevel::Info,
            "Mirror core is ready for use!",
            Some(&json!({
                "loaded": modules.loaded_count(),
                "enabled": modules.enabled().count(),
                "skipped": modules.skipped_count(),
            })),
        );
        self.progress.advance(budget::READY);

        Ok(BootReport {
            version: env!("CARGO_PKG_VERSION"),
            config_dir,
            modules_dir,
            settings,
            devtools,
            modules,
            telemetry: self.telemetry.snapshot(),
        })
    }
}

/// `err` followed by each of its sources, colon separated.
fn error_chain(err: &BootstrapError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
