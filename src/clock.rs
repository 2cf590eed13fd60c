//! Clock and timer abstraction.
//!
//! Every delay in the engine (acceptance windows, re-query pauses, the
//! matching deadline, geocoder timeouts) goes through a [`Clock`], so tests can
//! drive time deterministically. [`TokioClock`] is built on `tokio::time` and
//! therefore honours a paused test runtime (`#[tokio::test(start_paused = true)]`).

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Source of time and delayed callbacks.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Run `callback` once after `delay` unless the returned handle is
    /// cancelled (or dropped) first.
    fn schedule(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> TimerHandle {
        let token = CancellationToken::new();
        let sleep = self.sleep(delay);
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    tracing::trace!("Timer cancelled before firing");
                }
                _ = sleep => callback(),
            }
        });
        TimerHandle { token, handle }
    }
}

/// Clock backed by the tokio timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Handle to a scheduled callback. Dropping it cancels the callback, so a
/// timer never outlives the scope that created it.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancel the callback if it has not fired yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the callback ran or the timer was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
