pub mod defaults;
pub mod error;
pub mod modules;
pub mod runtime;
pub mod settings;

pub use defaults::{DefaultsSeeder, FsDefaultsSeeder};
pub use error::BootstrapError;
pub use modules::{
    validate, CompletionBarrier, DiscoveryOutcome, DiscoveryProgress, DiscoveryReport,
    FsManifestSource, ManifestSource, ModuleDiscovery, ModuleManifest, Rejection, SkipReason,
    SkippedModule,
};
pub use runtime::config::{BootstrapConfig, BootstrapConfigBuilder, BootstrapConfigParams};
pub use runtime::fatal::{CrashReport, FatalErrorHandler};
pub use runtime::logger::{LogLevel, Logger};
pub use runtime::progress::ProgressAccumulator;
pub use runtime::reporter::{NullReporter, TracingReporter, UiReporter};
pub use runtime::runner::{BootReport, Bootstrap};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use settings::{Settings, SettingsStore};
