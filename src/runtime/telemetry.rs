use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: boot milestones at `info`, everything
/// else only from `warn` up.
pub const DEFAULT_LOG_FILTER: &str = "warn,specular_boot=info";

static SUBSCRIBER: Once = Once::new();

/// Installs the fmt subscriber for boot logs unless another one is already set.
pub fn init_tracing() {
    SUBSCRIBER.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init();
    });
}

/// Counters describing what startup did, for summaries and tests.
#[derive(Default, Debug)]
pub struct Telemetry {
    modules_loaded: AtomicU64,
    modules_skipped: AtomicU64,
    manifest_timeouts: AtomicU64,
    defaults_seeded: AtomicU64,
}

impl Telemetry {
    pub fn record_module_loaded(&self) {
        self.modules_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_module_skipped(&self) {
        self.modules_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manifest_timeout(&self) {
        self.manifest_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_defaults_seeded(&self) {
        self.defaults_seeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            modules_loaded: self.modules_loaded.load(Ordering::Relaxed),
            modules_skipped: self.modules_skipped.load(Ordering::Relaxed),
            manifest_timeouts: self.manifest_timeouts.load(Ordering::Relaxed),
            defaults_seeded: self.defaults_seeded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub modules_loaded: u64,
    pub modules_skipped: u64,
    pub manifest_timeouts: u64,
    pub defaults_seeded: u64,
}
