//! Per-instance debouncing for checks driven by keystrokes, such as fund-name availability.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// Runs only the most recently scheduled job, once, after `delay` of quiet.
///
/// Each instance owns its pending job, so two inputs debounced independently never cancel
/// each other. Dropping the debouncer cancels whatever is still pending.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces the pending job with `job`. Must be called inside a tokio runtime.
    pub fn schedule<Fut>(&mut self, job: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            if !handle.is_finished() {
                trace!("cancelling pending debounced job");
            }
            handle.abort();
        }
    }

    /// True while a scheduled job has not finished running.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
