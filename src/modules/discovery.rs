//! Fan-out/fan-in discovery of module manifests.
//!
//! One task is spawned per directory entry. Each task reaches exactly one
//! terminal [`DiscoveryOutcome`], stores it in the slot for its launch position
//! and arrives at a [`CompletionBarrier`]. The caller waits on the barrier and
//! assembles the report from the slots, so the report order is the launch
//! order no matter how reads interleave. Tasks live in a [`JoinSet`], so
//! abandoning a discovery aborts the reads still in flight.

use super::barrier::CompletionBarrier;
use super::manifest::{DiscoveryOutcome, DiscoveryReport, Rejection, SkipReason};
use super::source::{FsManifestSource, ManifestSource};
use super::validator::validate;
use crate::defaults::{DefaultsSeeder, FsDefaultsSeeder};
use crate::error::BootstrapError;
use crate::runtime::config::BootstrapConfig;
use crate::runtime::logger::{LogLevel, Logger};
use crate::runtime::progress::ProgressAccumulator;
use crate::runtime::telemetry::Telemetry;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Share of the loading bar that discovery spreads over its candidates.
#[derive(Debug, Clone)]
pub struct DiscoveryProgress {
    accumulator: Arc<ProgressAccumulator>,
    budget: f64,
    shutdown: Option<CancellationToken>,
}

impl DiscoveryProgress {
    pub fn new(accumulator: Arc<ProgressAccumulator>, budget: f64) -> Self {
        Self {
            accumulator,
            budget,
            shutdown: None,
        }
    }

    /// Stops advancing the bar once `shutdown` is cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn advance(&self, increment: f64) {
        if self
            .shutdown
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return;
        }
        self.accumulator.advance(increment);
    }
}

pub struct ModuleDiscovery<S: ManifestSource = FsManifestSource> {
    source: Arc<S>,
    seeder: Arc<dyn DefaultsSeeder>,
    manifest_file_name: String,
    default_modules: PathBuf,
    read_timeout: Duration,
    logger: Arc<Logger>,
    telemetry: Arc<Telemetry>,
}

impl ModuleDiscovery<FsManifestSource> {
    pub fn new(config: &BootstrapConfig, logger: Arc<Logger>, telemetry: Arc<Telemetry>) -> Self {
        Self::with_source(config, FsManifestSource, logger, telemetry)
    }
}

impl<S: ManifestSource> ModuleDiscovery<S> {
    pub fn with_source(
        config: &BootstrapConfig,
        source: S,
        logger: Arc<Logger>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            source: Arc::new(source),
            seeder: Arc::new(FsDefaultsSeeder),
            manifest_file_name: config.manifest_file_name().to_owned(),
            default_modules: config.default_modules_dir(),
            read_timeout: config.manifest_read_timeout(),
            logger,
            telemetry,
        }
    }

    pub fn with_seeder(mut self, seeder: Arc<dyn DefaultsSeeder>) -> Self {
        self.seeder = seeder;
        self
    }

    /// Discovers every module under `modules_dir` and returns once all of them
    /// reached a terminal outcome.
    ///
    /// A missing `modules_dir` is seeded from the bundled defaults and listed
    /// once more. Only directory-level failures are errors; individual modules
    /// are reported as skipped.
    pub async fn discover(
        &self,
        modules_dir: &Path,
        progress: Option<&DiscoveryProgress>,
    ) -> Result<DiscoveryReport, BootstrapError> {
        self.logger.info("Obtaining module manifest files.");

        let candidates = self.list_candidates(modules_dir).await?;
        self.logger.log(
            LogLevel::Debug,
            "Files found in modules directory:",
            Some(&json!(candidates)),
        );

        if candidates.is_empty() {
            self.logger.info("No modules found.");
            return Ok(DiscoveryReport::empty());
        }

        let increment = progress.and_then(|progress| {
            ProgressAccumulator::module_increment(progress.budget, candidates.len())
                .map(|increment| (progress.clone(), increment))
        });
        let slots = Arc::new(OutcomeSlots::new(candidates.len()));
        let (barrier, waiter) = CompletionBarrier::new(candidates.len());
        let mut tasks = JoinSet::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let task = CandidateTask {
                index,
                candidate: candidate.clone(),
                path: modules_dir.join(candidate).join(&self.manifest_file_name),
                source: self.source.clone(),
                read_timeout: self.read_timeout,
                logger: self.logger.clone(),
                telemetry: self.telemetry.clone(),
                slots: slots.clone(),
                barrier: barrier.clone(),
                progress: increment.clone(),
            };
            tasks.spawn(task.run());
        }
        drop(barrier);

        waiter.wait().await;
        drop(tasks);

        let outcomes = candidates
            .into_iter()
            .zip(slots.take())
            .map(|(candidate, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    DiscoveryOutcome::Skipped(Rejection::new(
                        SkipReason::ReadFailed,
                        "discovery task ended without an outcome",
                    ))
                });
                (candidate, outcome)
            })
            .collect();
        let report = DiscoveryReport::from_outcomes(outcomes);

        self.logger.log(
            LogLevel::Info,
            "All module manifests processed.",
            Some(&json!({
                "loaded": report.loaded_count(),
                "skipped": report.skipped_count(),
            })),
        );
        Ok(report)
    }

    async fn list_candidates(&self, modules_dir: &Path) -> Result<Vec<String>, BootstrapError> {
        match read_entry_names(modules_dir).await {
            Ok(names) => return Ok(names),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(BootstrapError::ListModules {
                    path: modules_dir.to_path_buf(),
                    source,
                });
            }
        }

        self.logger
            .warn("No module folder found, copying default modules.");
        self.seed(modules_dir).await?;

        match read_entry_names(modules_dir).await {
            Ok(names) => Ok(names),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(BootstrapError::ModulesMissingAfterSeed {
                    path: modules_dir.to_path_buf(),
                })
            }
            Err(source) => Err(BootstrapError::ListModules {
                path: modules_dir.to_path_buf(),
                source,
            }),
        }
    }

    async fn seed(&self, modules_dir: &Path) -> Result<(), BootstrapError> {
        let copied = self
            .seeder
            .seed_tree(&self.default_modules, modules_dir)
            .await
            .map_err(|source| BootstrapError::SeedModules {
                path: modules_dir.to_path_buf(),
                source,
            })?;

        self.telemetry.record_defaults_seeded();
        tracing::debug!(
            from = %self.default_modules.display(),
            to = %modules_dir.display(),
            files = copied,
            "seeded default modules"
        );
        Ok(())
    }
}

/// Write-once outcome storage indexed by launch position.
struct OutcomeSlots {
    slots: Mutex<Vec<Option<DiscoveryOutcome>>>,
}

impl OutcomeSlots {
    fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; len]),
        }
    }

    /// Stores `outcome` unless the slot is already filled. Returns whether it was stored.
    fn record(&self, index: usize, outcome: DiscoveryOutcome) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
        match slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(outcome);
                true
            }
            _ => false,
        }
    }

    fn take(&self) -> Vec<Option<DiscoveryOutcome>> {
        std::mem::take(&mut *self.slots.lock().unwrap_or_else(|err| err.into_inner()))
    }
}

struct CandidateTask<S: ManifestSource> {
    index: usize,
    candidate: String,
    path: PathBuf,
    source: Arc<S>,
    read_timeout: Duration,
    logger: Arc<Logger>,
    telemetry: Arc<Telemetry>,
    slots: Arc<OutcomeSlots>,
    barrier: CompletionBarrier,
    progress: Option<(DiscoveryProgress, f64)>,
}

impl<S: ManifestSource> CandidateTask<S> {
    async fn run(self) {
        let outcome = match std::panic::AssertUnwindSafe(self.resolve())
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic_payload) => DiscoveryOutcome::Skipped(Rejection::new(
                SkipReason::ReadFailed,
                format!("manifest read panicked: {}", panic_message(panic_payload.as_ref())),
            )),
        };
        self.complete(outcome);
    }

    /// A failed or timed out read never reaches the validator.
    async fn resolve(&self) -> DiscoveryOutcome {
        let text = match timeout(self.read_timeout, self.source.read_manifest(&self.path)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                return DiscoveryOutcome::Skipped(Rejection::new(
                    SkipReason::ReadFailed,
                    format!("{}: {err}", self.path.display()),
                ));
            }
            Err(_) => {
                self.telemetry.record_manifest_timeout();
                return DiscoveryOutcome::Skipped(Rejection::new(
                    SkipReason::ReadFailed,
                    format!(
                        "{}: read timed out after {:?}",
                        self.path.display(),
                        self.read_timeout
                    ),
                ));
            }
        };

        validate(&self.candidate, &text).into()
    }

    fn complete(self, outcome: DiscoveryOutcome) {
        match &outcome {
            DiscoveryOutcome::Loaded(manifest) => {
                self.telemetry.record_module_loaded();
                self.logger.info(&format!(
                    "Loaded manifest of module '{}' ({} {}).",
                    self.candidate,
                    manifest.name(),
                    manifest.version()
                ));
            }
            DiscoveryOutcome::Skipped(rejection) => {
                self.telemetry.record_module_skipped();
                self.logger.log(
                    LogLevel::Warn,
                    &format!("Skipping module '{}': {}.", self.candidate, rejection.reason),
                    Some(&json!({ "detail": rejection.detail })),
                );
            }
        }

        if !self.slots.record(self.index, outcome) {
            tracing::warn!(
                candidate = %self.candidate,
                index = self.index,
                "discovery outcome already recorded; ignoring duplicate"
            );
            return;
        }

        if let Some((progress, increment)) = &self.progress {
            progress.advance(*increment);
        }
        self.barrier.arrive();
    }
}

/// Entry names of `dir`, sorted so launch order does not depend on the platform.
async fn read_entry_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
