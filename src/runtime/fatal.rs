use anyhow::Error as AnyError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// What the shell needs to render its crash view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub message: String,
    pub history: Vec<String>,
}

/// Captures the first critical failure and cancels the boot token.
///
/// Later triggers are logged but do not replace the captured report.
#[derive(Clone)]
pub struct FatalErrorHandler {
    inner: Arc<FatalInner>,
}

struct FatalInner {
    triggered: AtomicBool,
    shutdown: CancellationToken,
    captured: Mutex<Option<CapturedFatal>>,
    notify: Notify,
}

#[derive(Clone)]
struct CapturedFatal {
    error: Arc<AnyError>,
    history: Vec<String>,
}

impl fmt::Debug for FatalErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FatalErrorHandler")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

impl FatalErrorHandler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(FatalInner {
                triggered: AtomicBool::new(false),
                shutdown,
                captured: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Records `error` with the log history leading up to it and cancels the boot.
    ///
    /// Returns `true` when this call captured the error.
    pub fn trigger(&self, error: AnyError, history: Vec<String>) -> bool {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            tracing::warn!(error = %error, "additional fatal error after crash was captured");
            return false;
        }

        {
            let mut slot = self
                .inner
                .captured
                .lock()
                .unwrap_or_else(|err| err.into_inner());
            if slot.is_none() {
                *slot = Some(CapturedFatal {
                    error: Arc::new(error),
                    history,
                });
            }
        }

        self.inner.shutdown.cancel();
        self.inner.notify.notify_waiters();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    pub fn crash_report(&self) -> Option<CrashReport> {
        self.inner
            .captured
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .as_ref()
            .map(|captured| CrashReport {
                message: format!("{:#}", captured.error),
                history: captured.history.clone(),
            })
    }

    /// Waits until a fatal error has been captured.
    pub async fn crashed(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}
