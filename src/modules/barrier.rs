use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Counting barrier released by the last of `expected` arrivals.
///
/// Each participant calls [`CompletionBarrier::arrive`] once. The arrival that
/// drops the remaining count to zero flips the watch channel; every
/// [`CompletionWaiter`] observes it without polling. A barrier created for
/// zero participants is already released.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    inner: Arc<BarrierInner>,
}

#[derive(Debug)]
struct BarrierInner {
    remaining: AtomicUsize,
    done_tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CompletionWaiter {
    done_rx: watch::Receiver<bool>,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> (Self, CompletionWaiter) {
        let (done_tx, done_rx) = watch::channel(expected == 0);
        let barrier = Self {
            inner: Arc::new(BarrierInner {
                remaining: AtomicUsize::new(expected),
                done_tx,
            }),
        };
        (barrier, CompletionWaiter { done_rx })
    }

    /// Records one arrival. Returns `true` for the arrival that released the barrier.
    ///
    /// Arrivals past the expected count are ignored and return `false`.
    pub fn arrive(&self) -> bool {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            });

        match previous {
            Ok(1) => {
                self.inner.done_tx.send_replace(true);
                true
            }
            Ok(_) => false,
            Err(_) => {
                tracing::warn!("completion barrier received an arrival after release");
                false
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::SeqCst)
    }
}

impl CompletionWaiter {
    pub fn is_released(&self) -> bool {
        *self.done_rx.borrow()
    }

    /// Resolves once every expected participant has arrived.
    pub async fn wait(mut self) {
        // The sender lives inside the barrier; if every barrier clone is gone
        // without releasing, there is nobody left to arrive.
        let _ = self.done_rx.wait_for(|done| *done).await;
    }
}
