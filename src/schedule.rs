//! Cancellable periodic tasks.
//!
//! Detection, stats recomputation and the timer display each run on their
//! own interval with no ordering between them. Cancelling a task stops
//! future firings; a firing that has already started runs to completion.

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running periodic task. Dropping it cancels the task.
pub struct PeriodicTask {
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Stop future firings without waiting.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Stop future firings and wait for an in-flight one to finish.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run `tick` every `period`, starting one period from now.
///
/// Late ticks are delayed rather than bunched up, so a slow firing does not
/// trigger a burst of catch-up calls.
pub fn spawn_periodic<F, Fut>(period: Duration, mut tick: F) -> PeriodicTask
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => break,
                _ = interval.tick() => tick().await,
            }
        }
    });

    PeriodicTask {
        cancel: Some(cancel_tx),
        handle: Some(handle),
    }
}
