use std::env;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use specular_boot::{BootReport, Bootstrap, BootstrapConfig, TracingReporter, UiReporter};

const DEFAULT_LOG_DIRECTIVE: &str = "info,specular_boot::progress=debug";
const BAR_LENGTH: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    init_example_tracing();

    let config = BootstrapConfig::from_env()?;
    // Piped output gets progress as log events instead of a redrawn bar.
    let console = Console::new(io::stdout().is_terminal());
    console.println(format!(
        "Booting mirror with defaults from {}",
        config.defaults_dir().display()
    ));

    let bootstrap = Bootstrap::new(config, console.reporter());

    let shutdown = bootstrap.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let outcome = bootstrap.run().await;
    ctrl_c.abort();

    match outcome {
        Ok(report) => {
            print_summary(&console, &report);
            Ok(())
        }
        Err(err) => {
            console.abandon("startup aborted");
            if let Some(crash) = bootstrap.crash_report() {
                for line in crash.history.iter().rev().take(10).rev() {
                    console.println(line);
                }
            }
            Err(err).context("mirror did not reach ready")
        }
    }
}

fn init_example_tracing() {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", DEFAULT_LOG_DIRECTIVE);
    }
    specular_boot::init_tracing();
}

fn build_progress_bar() -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(BAR_LENGTH), ProgressDrawTarget::stdout_with_hz(12));
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}",
    )
    .expect("valid progress bar template")
    .progress_chars("=>-");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_summary(console: &Console, report: &BootReport) {
    console.println(format!(
        "specular-boot {} ready from {}",
        report.version,
        report.config_dir.display()
    ));
    console.println(format!(
        "{} modules loaded ({} enabled), {} skipped, devtools {}",
        report.modules.loaded_count(),
        report.modules.enabled().count(),
        report.modules.skipped_count(),
        if report.devtools { "on" } else { "off" }
    ));
    for skipped in report.modules.skipped() {
        console.println(format!(
            "  skipped {}: {} ({})",
            skipped.candidate, skipped.reason, skipped.detail
        ));
    }
}

/// A progress bar on a terminal, plain lines otherwise.
struct Console {
    bar: Option<ProgressBar>,
}

impl Console {
    fn new(interactive: bool) -> Self {
        Self {
            bar: interactive.then(build_progress_bar),
        }
    }

    fn reporter(&self) -> Arc<dyn UiReporter> {
        match &self.bar {
            Some(bar) => Arc::new(BarReporter { bar: bar.clone() }),
            None => Arc::new(TracingReporter),
        }
    }

    fn println(&self, message: impl AsRef<str>) {
        match &self.bar {
            Some(bar) => bar.println(message.as_ref()),
            None => println!("{}", message.as_ref()),
        }
    }

    fn abandon(&self, message: &'static str) {
        if let Some(bar) = &self.bar {
            bar.abandon_with_message(message);
        }
    }
}

/// Drives an indicatif bar from loading-screen signals.
struct BarReporter {
    bar: ProgressBar,
}

impl UiReporter for BarReporter {
    fn advance(&self, _increment: f64, total: f64) {
        self.bar.set_position(total.round() as u64);
    }

    fn ready(&self) {
        self.bar.finish_with_message("ready");
    }
}
