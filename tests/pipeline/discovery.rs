use std::{
    ffi::OsStr,
    fs, io,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use serde_json::json;
use specular_boot::{
    FatalErrorHandler, Logger, ManifestSource, ModuleDiscovery, SkipReason, Telemetry,
};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::support::helpers::{init_tracing, manifest, Workspace};

fn logger() -> Arc<Logger> {
    Arc::new(Logger::new(
        1_024,
        FatalErrorHandler::new(CancellationToken::new()),
    ))
}

/// Serves manifests from disk after a per-run, per-candidate delay so
/// completions arrive in a different order on every run.
struct ShuffledSource {
    rotation: usize,
    reads: AtomicUsize,
}

impl ShuffledSource {
    fn new(rotation: usize) -> Self {
        Self {
            rotation,
            reads: AtomicUsize::new(0),
        }
    }
}

impl ManifestSource for ShuffledSource {
    fn read_manifest<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        Box::pin(async move {
            let launch = self.reads.fetch_add(1, Ordering::SeqCst);
            let slot = (launch * 7 + self.rotation * 3) % 11;
            sleep(Duration::from_millis(slot as u64 * 3)).await;
            tokio::fs::read_to_string(path).await
        })
    }
}

#[tokio::test]
async fn loaded_plus_skipped_equals_candidates() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    let total = 40;
    for index in 0..total {
        let id = format!("module-{index:02}");
        match index % 4 {
            0 => workspace.write_module(&id, &manifest(&id)),
            1 => workspace.write_module(&id, &manifest("someone-else")),
            2 => fs::create_dir_all(workspace.modules_dir().join(&id))?,
            _ => {
                let mut document = manifest(&id);
                document["manifestVersion"] = json!("2");
                workspace.write_module(&id, &document);
            }
        }
    }

    let telemetry = Arc::new(Telemetry::default());
    let discovery = ModuleDiscovery::new(&workspace.config(), logger(), telemetry.clone());
    let report = discovery.discover(&workspace.modules_dir(), None).await?;

    assert_eq!(report.total(), total);
    assert_eq!(report.loaded_count(), 10);
    assert_eq!(report.skipped_count(), 30);
    let unsupported = report
        .skipped()
        .iter()
        .filter(|skipped| skipped.reason == SkipReason::UnsupportedVersion)
        .count();
    assert_eq!(unsupported, 10);

    let snapshot = telemetry.snapshot();
    assert_eq!(snapshot.modules_loaded + snapshot.modules_skipped, total as u64);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_is_identical_across_reordered_runs() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    for index in 0..12 {
        let id = format!("m{index:02}");
        if index % 3 == 0 {
            workspace.write_module(&id, &manifest("mismatch"));
        } else {
            workspace.write_module(&id, &manifest(&id));
        }
    }
    let config = workspace.config();

    let mut reports = Vec::new();
    for rotation in 0..3 {
        let discovery = ModuleDiscovery::with_source(
            &config,
            ShuffledSource::new(rotation),
            logger(),
            Arc::new(Telemetry::default()),
        );
        reports.push(discovery.discover(&workspace.modules_dir(), None).await?);
    }

    let ids: Vec<_> = reports[0].loaded().iter().map(|m| m.id()).collect();
    assert_eq!(
        ids,
        vec!["m01", "m02", "m04", "m05", "m07", "m08", "m10", "m11"]
    );
    assert_eq!(reports[0], reports[1]);
    assert_eq!(reports[1], reports[2]);
    Ok(())
}

#[tokio::test]
async fn zero_candidates_never_hang() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    fs::create_dir_all(workspace.modules_dir())?;

    let discovery = ModuleDiscovery::new(
        &workspace.config(),
        logger(),
        Arc::new(Telemetry::default()),
    );
    let report = timeout(
        Duration::from_millis(500),
        discovery.discover(&workspace.modules_dir(), None),
    )
    .await
    .expect("discovery over an empty directory completes")?;

    assert!(report.loaded().is_empty());
    assert_eq!(report.skipped_count(), 0);
    Ok(())
}

/// Reads that stall forever on one candidate.
struct StallingSource {
    stalled: &'static str,
}

impl ManifestSource for StallingSource {
    fn read_manifest<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        Box::pin(async move {
            if path.parent().and_then(Path::file_name) == Some(OsStr::new(self.stalled)) {
                futures::future::pending::<()>().await;
            }
            tokio::fs::read_to_string(path).await
        })
    }
}

/// A read that never resolves is cut off by the per-read timeout.
#[tokio::test]
async fn stalled_read_is_bounded_by_timeout() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_module("fast", &manifest("fast"));
    workspace.write_module("slow", &manifest("slow"));
    let config = workspace
        .builder()
        .manifest_read_timeout(Duration::from_millis(100))
        .build()?;

    let telemetry = Arc::new(Telemetry::default());
    let discovery = ModuleDiscovery::with_source(
        &config,
        StallingSource { stalled: "slow" },
        logger(),
        telemetry.clone(),
    );
    let report = timeout(
        Duration::from_secs(2),
        discovery.discover(&workspace.modules_dir(), None),
    )
    .await
    .expect("timeout must release the stalled candidate")?;

    assert_eq!(report.loaded()[0].id(), "fast");
    assert_eq!(report.skipped()[0].candidate, "slow");
    assert_eq!(report.skipped()[0].reason, SkipReason::ReadFailed);
    assert_eq!(telemetry.snapshot().manifest_timeouts, 1);
    Ok(())
}
