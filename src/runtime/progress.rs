use crate::runtime::reporter::UiReporter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FULL_PROGRESS: f64 = 100.0;

/// Share of the loading bar assigned to each startup milestone.
pub mod budget {
    pub const LOADING_SHOWN: f64 = 10.0;
    pub const SETTINGS_READY: f64 = 10.0;
    pub const DEVTOOLS_DECIDED: f64 = 5.0;
    pub const MODULES: f64 = 70.0;
    pub const READY: f64 = 5.0;
}

/// Running loading percentage, clamped to `[0, 100]`, forwarded to a [`UiReporter`].
pub struct ProgressAccumulator {
    total: Mutex<f64>,
    finished: AtomicBool,
    reporter: Arc<dyn UiReporter>,
    display_delay: Duration,
}

impl ProgressAccumulator {
    pub fn new(reporter: Arc<dyn UiReporter>, display_delay: Duration) -> Self {
        Self {
            total: Mutex::new(0.0),
            finished: AtomicBool::new(false),
            reporter,
            display_delay,
        }
    }

    /// Adds `increment` to the running total and returns the amount actually applied.
    ///
    /// Negative, non-finite and zero increments are ignored; anything that would
    /// push the total past 100 is truncated.
    pub fn advance(&self, increment: f64) -> f64 {
        if !increment.is_finite() || increment <= 0.0 {
            return 0.0;
        }

        let (applied, total) = {
            let mut total = self.total.lock().unwrap_or_else(|err| err.into_inner());
            let next = (*total + increment).min(FULL_PROGRESS);
            let applied = next - *total;
            *total = next;
            (applied, next)
        };

        if applied > 0.0 {
            self.reporter.advance(applied, total);
        }
        applied
    }

    pub fn total(&self) -> f64 {
        *self.total.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Fills the bar, holds it for the display delay, then signals `ready` once.
    pub async fn finish(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }

        let remaining = FULL_PROGRESS - self.total();
        self.advance(remaining);

        if !self.display_delay.is_zero() {
            tokio::time::sleep(self.display_delay).await;
        }
        self.reporter.ready();
    }

    /// Per-module share of `budget`, or `None` when there are no modules to split it over.
    pub fn module_increment(budget: f64, modules: usize) -> Option<f64> {
        if modules == 0 {
            None
        } else {
            Some(budget / modules as f64)
        }
    }
}

impl std::fmt::Debug for ProgressAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAccumulator")
            .field("total", &self.total())
            .field("finished", &self.is_finished())
            .finish()
    }
}
