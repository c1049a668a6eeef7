//! Trailing-edge debounced persistence of the code draft.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::lock;
use crate::ports::DocumentStore;

/// Each `schedule` call replaces the pending write, so only the last value
/// inside a quiet window reaches the store.
pub struct DraftPersister {
    store: Arc<dyn DocumentStore>,
    assignment_id: String,
    quiet: Duration,
    pending: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl DraftPersister {
    pub fn new(store: Arc<dyn DocumentStore>, assignment_id: impl Into<String>, quiet: Duration) -> Self {
        Self {
            store,
            assignment_id: assignment_id.into(),
            quiet,
            pending: Mutex::new(Pending::default()),
        }
    }

    /// No-op once [`DraftPersister::close`] has run.
    pub fn schedule(&self, code: String) {
        let mut pending = lock(&self.pending);
        if pending.closed {
            tracing::debug!(assignment_id = %self.assignment_id, "draft dropped after close");
            return;
        }
        let store = Arc::clone(&self.store);
        let assignment_id = self.assignment_id.clone();
        let quiet = self.quiet;
        let task = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            match store.save_draft(&assignment_id, &code).await {
                Ok(()) => tracing::trace!(%assignment_id, bytes = code.len(), "draft saved"),
                Err(err) => tracing::warn!(%assignment_id, error = %err, "draft save failed"),
            }
        });

        if let Some(previous) = pending.task.replace(task) {
            previous.abort();
        }
    }

    /// Drop any pending write without sending it and refuse later ones.
    pub fn close(&self) {
        let mut pending = lock(&self.pending);
        pending.closed = true;
        if let Some(task) = pending.task.take() {
            task.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.pending)
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for DraftPersister {
    fn drop(&mut self) {
        self.close();
    }
}
