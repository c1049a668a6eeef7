//! Shared wiring for the store-backed commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use proctor_core::{AssignmentStatus, Clock, SystemClock};
use proctor_session::ports::{AuthUser, DocumentStore, Navigator, Route};

use crate::file_store::JsonFileStore;
use crate::identity::LocalIdentity;

/// Logs navigation instead of rendering a page.
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route) {
        tracing::info!(route = %route.path(), "navigate");
    }
}

pub struct LocalContext {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<LocalIdentity>,
    pub navigator: Arc<ConsoleNavigator>,
    pub clock: Arc<dyn Clock>,
}

impl LocalContext {
    pub async fn open(store_path: &Path) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = Arc::new(
            JsonFileStore::open(store_path)
                .await
                .with_context(|| format!("cannot open store {}", store_path.display()))?,
        );
        Ok(Self {
            identity: Arc::new(LocalIdentity::new(Arc::clone(&store))),
            store,
            navigator: Arc::new(ConsoleNavigator),
            clock: Arc::new(SystemClock),
        })
    }

    /// Act as `uid` when given.
    pub async fn actor(&self, uid: Option<&str>) -> anyhow::Result<Option<AuthUser>> {
        match uid {
            Some(uid) => Ok(Some(self.identity.act_as(uid).await?)),
            None => Ok(None),
        }
    }
}

pub fn status_label(status: AssignmentStatus) -> &'static str {
    match status {
        AssignmentStatus::Assigned => "assigned",
        AssignmentStatus::InProgress => "in progress",
        AssignmentStatus::Completed => "completed",
    }
}
