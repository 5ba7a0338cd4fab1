use std::{fs, io, path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use serde_json::Value;
use specular_boot::{
    Bootstrap, BootstrapError, ManifestSource, NullReporter, Settings, SkipReason,
};
use tokio::time::{sleep, timeout};

use crate::support::helpers::{init_tracing, manifest, RecordingReporter, Workspace, DEFAULT_CONFIG};

#[tokio::test]
async fn fresh_home_boots_from_bundled_defaults() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_default_module("clock");
    workspace.write_default_module("weather");
    let reporter = Arc::new(RecordingReporter::default());

    let bootstrap = Bootstrap::new(workspace.config(), reporter.clone());
    let report = bootstrap.run().await?;

    let expected: Settings = serde_json::from_str(DEFAULT_CONFIG)?;
    assert_eq!(report.settings, expected);
    assert!(!report.devtools);
    assert_eq!(report.config_dir, workspace.config_dir());
    assert_eq!(report.modules_dir, workspace.modules_dir());
    assert_eq!(
        fs::read_to_string(workspace.config_dir().join("config.json"))?,
        DEFAULT_CONFIG
    );

    let ids: Vec<_> = report.modules.loaded().iter().map(|m| m.id()).collect();
    assert_eq!(ids, vec!["clock", "weather"]);
    assert_eq!(report.telemetry.defaults_seeded, 2);

    assert_eq!(reporter.last_total(), Some(100.0));
    assert_eq!(reporter.ready_count(), 1);
    assert!(bootstrap.crash_report().is_none());
    Ok(())
}

#[tokio::test]
async fn existing_configuration_is_used_as_is() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_settings(r#"{"debug": true, "units": "imperial"}"#);
    fs::create_dir_all(workspace.modules_dir())?;
    workspace.write_module("a", &manifest("a"));

    let reporter = Arc::new(RecordingReporter::default());
    let report = Bootstrap::new(workspace.config(), reporter.clone())
        .run()
        .await?;

    assert!(report.devtools);
    assert_eq!(report.settings.get("units"), Some(&Value::from("imperial")));
    assert_eq!(report.modules.loaded_count(), 1);
    assert_eq!(report.telemetry.defaults_seeded, 0);
    Ok(())
}

#[tokio::test]
async fn end_to_end_mixed_modules() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_settings(DEFAULT_CONFIG);
    workspace.write_module("a", &manifest("a"));
    fs::create_dir_all(workspace.modules_dir().join("b"))?;
    workspace.write_module("c", &manifest("x"));

    let reporter = Arc::new(RecordingReporter::default());
    let report = Bootstrap::new(workspace.config(), reporter.clone())
        .run()
        .await?;

    let expected = specular_boot::validate("a", &manifest("a").to_string()).unwrap();
    assert_eq!(report.modules.loaded(), &[expected]);
    assert_eq!(report.modules.skipped_count(), 2);
    let reasons: Vec<_> = report.modules.skipped().iter().map(|s| s.reason).collect();
    assert_eq!(reasons, vec![SkipReason::ReadFailed, SkipReason::IdMismatch]);

    let totals = reporter.totals();
    assert!(totals.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(totals.last().copied(), Some(100.0));
    Ok(())
}

#[tokio::test]
async fn empty_modules_directory_still_reaches_ready() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_settings(DEFAULT_CONFIG);
    fs::create_dir_all(workspace.modules_dir())?;

    let reporter = Arc::new(RecordingReporter::default());
    let bootstrap = Bootstrap::new(workspace.config(), reporter.clone());
    let report = timeout(Duration::from_secs(2), bootstrap.run())
        .await
        .expect("boot must not hang with zero modules")?;

    assert_eq!(report.modules.total(), 0);
    assert_eq!(reporter.last_total(), Some(100.0));
    assert_eq!(reporter.ready_count(), 1);
    Ok(())
}

#[tokio::test]
async fn settings_can_redirect_the_modules_directory() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_settings(r#"{"debug": false, "modulesDirectory": "custom"}"#);
    let custom = workspace.config_dir().join("custom/solo");
    fs::create_dir_all(&custom)?;
    fs::write(custom.join("manifest.json"), manifest("solo").to_string())?;

    let report = Bootstrap::new(workspace.config(), Arc::new(NullReporter))
        .run()
        .await?;

    assert_eq!(report.modules_dir, workspace.config_dir().join("custom"));
    assert_eq!(report.modules.loaded()[0].id(), "solo");
    Ok(())
}

#[tokio::test]
async fn malformed_settings_is_critical_and_never_ready() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_settings("{ \"debug\": tru");

    let reporter = Arc::new(RecordingReporter::default());
    let bootstrap = Bootstrap::new(workspace.config(), reporter.clone());
    let err = bootstrap
        .run()
        .await
        .expect_err("malformed settings must halt the pipeline");

    assert!(matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::ParseSettings { .. })
    ));
    assert_eq!(reporter.ready_count(), 0);
    assert!(reporter.last_total().unwrap_or_default() < 100.0);
    assert!(bootstrap.cancellation_token().is_cancelled());

    let crash = bootstrap.crash_report().expect("critical log captures a crash");
    assert!(crash.message.contains("not valid JSON"));
    assert!(crash
        .history
        .iter()
        .any(|line| line.contains("[CRITICAL]")));
    assert!(crash
        .history
        .last()
        .is_some_and(|line| line.ends_with("[CRASH] Mirror has stopped working.")));
    Ok(())
}

#[tokio::test]
async fn missing_default_modules_is_critical() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_settings(DEFAULT_CONFIG);
    fs::remove_dir_all(workspace.defaults().join("modules"))?;

    let reporter = Arc::new(RecordingReporter::default());
    let bootstrap = Bootstrap::new(workspace.config(), reporter.clone());
    let err = bootstrap.run().await.expect_err("seeding must fail");

    assert!(matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::SeedModules { .. })
    ));
    assert_eq!(reporter.ready_count(), 0);
    assert!(bootstrap.crash_report().is_some());
    Ok(())
}

#[tokio::test]
async fn cancelled_token_stops_before_ready() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    let reporter = Arc::new(RecordingReporter::default());
    let bootstrap = Bootstrap::new(workspace.config(), reporter.clone());
    bootstrap.cancellation_token().cancel();

    let err = bootstrap.run().await.expect_err("cancelled boot must fail");

    assert!(matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::Cancelled)
    ));
    assert_eq!(reporter.ready_count(), 0);
    assert!(bootstrap.crash_report().is_none());
    Ok(())
}

/// Serves every manifest after a fixed delay.
struct SlowSource(Duration);

impl ManifestSource for SlowSource {
    fn read_manifest<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        Box::pin(async move {
            sleep(self.0).await;
            tokio::fs::read_to_string(path).await
        })
    }
}

#[tokio::test]
async fn cancelling_mid_discovery_freezes_progress() -> Result<()> {
    init_tracing();
    let workspace = Workspace::new();
    workspace.write_settings(DEFAULT_CONFIG);
    workspace.write_module("a", &manifest("a"));
    workspace.write_module("b", &manifest("b"));

    let reporter = Arc::new(RecordingReporter::default());
    let bootstrap = Bootstrap::with_source(
        workspace.config(),
        reporter.clone(),
        SlowSource(Duration::from_millis(300)),
    );
    let token = bootstrap.cancellation_token();
    tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let err = bootstrap.run().await.expect_err("cancelled boot must fail");
    assert!(matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::Cancelled)
    ));
    let at_cancel = reporter.totals();
    assert_eq!(at_cancel, vec![10.0, 20.0, 25.0]);

    sleep(Duration::from_millis(600)).await;
    assert_eq!(reporter.totals(), at_cancel);
    assert_eq!(bootstrap.progress().total(), 25.0);
    assert_eq!(reporter.ready_count(), 0);
    Ok(())
}

