//! Repeating task with a first-class cancellation handle.
//!
//! Polling in the observed behavior hung off ambient UI timers; here the
//! schedule is an explicit value that can be cancelled and tested. Ticks
//! never overlap: each one runs to completion before the next is scheduled.
//! Cancellation is cooperative — it prevents the next tick but does not
//! abort one already in flight.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a tick tells the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// End the loop without touching the cancellation token.
    Stop,
}

pub struct RepeatingTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    /// Spawn with a private cancellation token.
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        Self::spawn_with_token(name, interval, CancellationToken::new(), tick)
    }

    /// Spawn on a caller-supplied token, so several tasks can share one
    /// cancellation scope.
    pub fn spawn_with_token<F, Fut>(
        name: &'static str,
        interval: Duration,
        cancel: CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            // First tick fires immediately; the interval separates
            // subsequent ones.
            loop {
                if token.is_cancelled() {
                    break;
                }
                if tick().await == TickOutcome::Stop {
                    break;
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(interval) => {}
                }
            }
            debug!(task = name, "Repeating task finished");
        });

        Self { name, cancel, handle }
    }

    /// Prevent any further tick. Idempotent.
    pub fn cancel(&self) {
        debug!(task = self.name, "Cancelling repeating task");
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
