use crate::config::PollingConfig;
use crate::error::{SessionError, SessionResult};
use crate::polling::Backoff;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

/// Adaptive poller around a fallible fetch.
///
/// The loop waits one interval, fetches, and on success hands the result to
/// `consume` and resets the interval. A failure grows the interval and is
/// passed to `on_error` together with the delay before the next attempt; the
/// loop keeps running. When `consume` returns `true` (new data arrived) the
/// loop rests for the configured quiet period first. Ticks that would have
/// fallen inside that pause are skipped, not queued.
pub struct PollingLoop;

impl PollingLoop {
    pub fn spawn<T, F, Fut, C, E>(
        name: &'static str,
        config: PollingConfig,
        mut fetch: F,
        mut consume: C,
        mut on_error: E,
    ) -> PollHandle
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = SessionResult<T>> + Send + 'static,
        C: FnMut(T) -> bool + Send + 'static,
        E: FnMut(&SessionError, Duration) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut backoff = Backoff::new(&config);

            loop {
                sleep(backoff.current()).await;

                match fetch().await {
                    Ok(value) => {
                        backoff.on_success();
                        let fresh = consume(value);
                        if fresh && !config.quiet_period.is_zero() {
                            trace!(poller = name, "new data, resting");
                            sleep(config.quiet_period).await;
                        }
                    }
                    Err(e) => {
                        let next = backoff.on_failure();
                        on_error(&e, next);
                    }
                }
            }
        });

        PollHandle { task }
    }
}

/// Owner of a running poll loop. Dropping the handle stops the loop.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stops the loop. Calling it again is a no-op.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
