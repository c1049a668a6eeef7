//! `DocumentStore` backed by one JSON file. Every write rewrites the whole
//! file through a temp file and rename, so readers never see a torn file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use proctor_core::error::{ProctorError, Result};
use proctor_core::{AssignmentRecord, SubmissionRecord, TestRecord, UserRecord, UserRole};
use proctor_session::Collections;
use proctor_session::ports::DocumentStore;

pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<Collections>,
    counter: AtomicU64,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Collections::default(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ProctorError::PersistenceFailure(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collections::default(),
            Err(e) => {
                return Err(ProctorError::PersistenceFailure(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        };
        tracing::debug!(path = %path.display(), tests = data.tests.len(), "store opened");
        Ok(Self {
            path,
            data: Mutex::new(data),
            counter: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `update` and write the result. The in-memory copy only changes
    /// when the write succeeds.
    async fn write_with(&self, update: impl FnOnce(&mut Collections)) -> Result<()> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        update(&mut next);
        write_atomic(&self.path, &next).await?;
        *data = next;
        Ok(())
    }
}

async fn write_atomic(path: &Path, data: &Collections) -> Result<()> {
    let failure = |e: &dyn std::fmt::Display| {
        ProctorError::PersistenceFailure(format!("{}: {e}", path.display()))
    };
    let json = serde_json::to_string_pretty(data).map_err(|e| failure(&e))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| failure(&e))?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, format!("{json}\n"))
        .await
        .map_err(|e| failure(&e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| failure(&e))?;
    Ok(())
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    fn generate_id(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{:x}{seq:04x}", chrono::Utc::now().timestamp_micros())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>> {
        Ok(self.data.lock().await.users.get(uid).cloned())
    }

    async fn put_user(&self, user: UserRecord) -> Result<()> {
        self.write_with(|c| {
            c.users.insert(user.uid.clone(), user);
        })
        .await
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<UserRecord>> {
        Ok(self.data.lock().await.users_with_role(role))
    }

    async fn get_test(&self, id: &str) -> Result<Option<TestRecord>> {
        Ok(self.data.lock().await.tests.get(id).cloned())
    }

    async fn put_test(&self, test: TestRecord) -> Result<()> {
        self.write_with(|c| {
            c.tests.insert(test.id.clone(), test);
        })
        .await
    }

    async fn list_tests(&self) -> Result<Vec<TestRecord>> {
        Ok(self.data.lock().await.tests_by_recency())
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<AssignmentRecord>> {
        Ok(self.data.lock().await.test_assignments.get(id).cloned())
    }

    async fn put_assignment(&self, assignment: AssignmentRecord) -> Result<()> {
        self.write_with(|c| {
            c.test_assignments.insert(assignment.id.clone(), assignment);
        })
        .await
    }

    async fn list_assignments(&self, user_id: Option<&str>) -> Result<Vec<AssignmentRecord>> {
        Ok(self.data.lock().await.assignments_for(user_id))
    }

    async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        Ok(self.data.lock().await.submissions.get(id).cloned())
    }

    async fn put_submission(&self, id: &str, submission: SubmissionRecord) -> Result<()> {
        self.write_with(|c| {
            c.submissions.insert(id.to_string(), submission);
        })
        .await
    }
}
