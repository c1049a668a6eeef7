//! Session clock: one repeating tick that derives remaining time from
//! elapsed wall-clock time and fires `on_expire` exactly once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use proctor_core::{Clock, remaining_seconds};

/// Wall clock that advances with tokio's clock, so paused-time tests and
/// throttled runtimes see the same elapsed time the timers do.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}

/// Countdown task handle. Dropping the handle does not stop the task;
/// call [`SessionClock::stop`] or cancel the token passed to `start`.
pub struct SessionClock {
    remaining: watch::Receiver<u64>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionClock {
    /// Start ticking. `on_expire` runs at most once, from the tick that
    /// first observes zero remaining seconds.
    pub fn start<F>(
        clock: Arc<dyn Clock>,
        started_at: DateTime<Utc>,
        duration_seconds: u64,
        tick: Duration,
        cancel: CancellationToken,
        on_expire: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let initial = remaining_seconds(started_at, duration_seconds, clock.now());
        let (tx, rx) = watch::channel(initial);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut on_expire = Some(on_expire);
            let mut last = initial;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // Never report more time than a previous tick did.
                let remaining =
                    remaining_seconds(started_at, duration_seconds, clock.now()).min(last);
                last = remaining;
                tx.send_replace(remaining);

                if remaining == 0 {
                    if let Some(expire) = on_expire.take() {
                        tracing::info!("session clock expired");
                        expire();
                    }
                    break;
                }
            }
        });

        Self {
            remaining: rx,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    /// Cancel the tick and wait for the task to finish. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
