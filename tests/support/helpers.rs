use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use specular_boot::{BootstrapConfig, BootstrapConfigBuilder, UiReporter};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub const DEFAULT_CONFIG: &str = r#"{"debug": false, "language": "en"}"#;

pub fn manifest(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Module {id}"),
        "version": "1.0.0",
        "author": "Specular",
        "main": "index.js",
        "description": "integration test module",
        "manifestVersion": "1",
        "enabled": true
    })
}

/// Records every signal sent to the loading screen.
#[derive(Default)]
pub struct RecordingReporter {
    advances: Mutex<Vec<(f64, f64)>>,
    ready: AtomicUsize,
}

impl RecordingReporter {
    pub fn totals(&self) -> Vec<f64> {
        self.advances
            .lock()
            .unwrap()
            .iter()
            .map(|(_, total)| *total)
            .collect()
    }

    pub fn last_total(&self) -> Option<f64> {
        self.totals().last().copied()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }
}

impl UiReporter for RecordingReporter {
    fn advance(&self, increment: f64, total: f64) {
        self.advances.lock().unwrap().push((increment, total));
    }

    fn ready(&self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }
}

/// Temporary home plus bundled defaults laid out like an installed shell.
pub struct Workspace {
    root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let workspace = Self {
            root: tempfile::tempdir().expect("tempdir"),
        };
        fs::create_dir_all(workspace.home()).unwrap();
        fs::create_dir_all(workspace.defaults().join("modules")).unwrap();
        fs::write(workspace.defaults().join("config.json"), DEFAULT_CONFIG).unwrap();
        workspace
    }

    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    pub fn defaults(&self) -> PathBuf {
        self.root.path().join("defaults")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.home().join(".specular-mirror")
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.config_dir().join("modules")
    }

    pub fn write_default_module(&self, id: &str) {
        write_manifest(&self.defaults().join("modules").join(id), &manifest(id));
    }

    pub fn write_module(&self, dir: &str, document: &Value) {
        write_manifest(&self.modules_dir().join(dir), document);
    }

    pub fn write_settings(&self, text: &str) {
        fs::create_dir_all(self.config_dir()).unwrap();
        fs::write(self.config_dir().join("config.json"), text).unwrap();
    }

    pub fn builder(&self) -> BootstrapConfigBuilder {
        BootstrapConfig::builder()
            .home_dir(self.home())
            .defaults_dir(self.defaults())
            .ready_display_delay(Duration::ZERO)
            .manifest_read_timeout(Duration::from_secs(2))
    }

    pub fn config(&self) -> BootstrapConfig {
        self.builder().build().expect("valid config")
    }
}

fn write_manifest(dir: &Path, document: &Value) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("manifest.json"), document.to_string()).unwrap();
}
