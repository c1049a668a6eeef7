//! Integrity Monitor: a periodic presence check plus a page-event listener.
//! Both tasks stop on cancellation and never outlive [`IntegrityMonitor::stop`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use proctor_core::{WarningKind, is_blocked_shortcut};

use crate::ports::{MediaStream, PageEvent, PageEvents};
use crate::strategy::PresenceStrategy;

/// Receiver of raised violations. The session decides whether to record.
pub trait ViolationSink: Send + Sync {
    fn raise(&self, kind: WarningKind);
}

pub struct IntegrityMonitor {
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl IntegrityMonitor {
    pub fn start(
        presence: Arc<dyn PresenceStrategy>,
        stream: Option<Arc<dyn MediaStream>>,
        page_events: &dyn PageEvents,
        sink: Arc<dyn ViolationSink>,
        presence_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let mut tasks = Vec::with_capacity(2);

        if presence.is_enabled() {
            tasks.push(tokio::spawn(presence_loop(
                presence,
                stream,
                Arc::clone(&sink),
                presence_interval,
                cancel.clone(),
            )));
        }

        let events = page_events.subscribe();
        tasks.push(tokio::spawn(page_event_loop(events, sink, cancel.clone())));

        Self {
            cancel,
            tasks: Mutex::new(tasks),
        }
    }

    /// Cancel both detectors and wait for them to exit. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            let _ = task.await;
        }
    }
}

async fn presence_loop(
    presence: Arc<dyn PresenceStrategy>,
    stream: Option<Arc<dyn MediaStream>>,
    sink: Arc<dyn ViolationSink>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(stream) = stream.as_deref() else {
            tracing::debug!("presence check skipped: no media stream");
            continue;
        };

        let verdict = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            verdict = presence.check(stream) => verdict,
        };

        match verdict {
            Ok(Some(kind)) => sink.raise(kind),
            Ok(None) => {}
            Err(err) => tracing::debug!(error = %err, "presence check skipped"),
        }
    }
}

async fn page_event_loop(
    mut events: mpsc::UnboundedReceiver<PageEvent>,
    sink: Arc<dyn ViolationSink>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            PageEvent::VisibilityHidden => sink.raise(WarningKind::FocusViolation),
            PageEvent::KeyDown(chord) if is_blocked_shortcut(&chord) => {
                tracing::trace!(key = %chord.key, "blocked shortcut suppressed");
                sink.raise(WarningKind::ShortcutViolation);
            }
            PageEvent::ContextMenu => tracing::trace!("context menu suppressed"),
            PageEvent::VisibilityVisible | PageEvent::KeyDown(_) => {}
        }
    }
    // Receiver drops here, which unregisters the listener.
}
