/// Receives loading progress for the shell's loading screen.
///
/// `increment` is the amount just applied and `total` the running percentage
/// after applying it; `total` never exceeds 100. `ready` is sent once, after the
/// final increment, when the loading screen should be dismissed.
pub trait UiReporter: Send + Sync + 'static {
    fn advance(&self, increment: f64, total: f64);

    fn ready(&self);
}

/// Discards every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl UiReporter for NullReporter {
    fn advance(&self, _increment: f64, _total: f64) {}

    fn ready(&self) {}
}

/// Emits progress as `tracing` events, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl UiReporter for TracingReporter {
    fn advance(&self, increment: f64, total: f64) {
        tracing::debug!(
            target: "specular_boot::progress",
            increment = format!("{increment:.2}"),
            total = format!("{total:.2}"),
            "loading progress"
        );
    }

    fn ready(&self) {
        tracing::info!(target: "specular_boot::progress", "loading complete");
    }
}
