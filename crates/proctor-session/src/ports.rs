//! Collaborator ports. Browser capabilities (camera, fullscreen, page
//! events, speech) and hosted services (identity, document store, text
//! model, code execution) are consumed only through these traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use proctor_core::error::{ProctorError, Result};
use proctor_core::{
    AssignmentRecord, ExecutionOutput, KeyChord, Language, SubmissionRecord, TestRecord,
    UserRecord, UserRole,
};

// ─── Media ────────────────────────────────────────────────────────

/// A live camera/microphone stream held for the whole attempt.
pub trait MediaStream: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn has_video(&self) -> bool;
    fn has_audio(&self) -> bool;
    /// Stop every track; the camera light goes off.
    fn stop_tracks(&self);
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn request_camera_and_mic(&self) -> Result<Arc<dyn MediaStream>>;
}

#[async_trait]
pub trait Fullscreen: Send + Sync {
    async fn request(&self) -> Result<()>;
    async fn exit(&self);
    fn is_active(&self) -> bool;
}

#[async_trait]
pub trait PresenceDetector: Send + Sync {
    /// Sample one frame from `stream` and count visible faces.
    ///
    /// `DetectorUnavailable` when the model is not loaded or no frame could
    /// be read.
    async fn count_faces(&self, stream: &dyn MediaStream) -> Result<usize>;
}

// ─── Speech ───────────────────────────────────────────────────────

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Listen until one utterance is recognized.
    async fn capture(&self) -> Result<String>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str);
}

// ─── Page Events ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    VisibilityHidden,
    VisibilityVisible,
    KeyDown(KeyChord),
    ContextMenu,
}

/// Source of page-level events. Each subscription is one registered
/// listener; dropping the receiver removes it.
pub trait PageEvents: Send + Sync {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<PageEvent>;
}

// ─── Document Store ───────────────────────────────────────────────

/// Last-write-wins document store for `users`, `tests`,
/// `testAssignments` and `submissions`. Write failures surface as
/// `PersistenceFailure`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fresh document id for inserts.
    fn generate_id(&self) -> String;

    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>>;
    async fn put_user(&self, user: UserRecord) -> Result<()>;
    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<UserRecord>>;

    async fn get_test(&self, id: &str) -> Result<Option<TestRecord>>;
    async fn put_test(&self, test: TestRecord) -> Result<()>;
    async fn list_tests(&self) -> Result<Vec<TestRecord>>;

    async fn get_assignment(&self, id: &str) -> Result<Option<AssignmentRecord>>;
    async fn put_assignment(&self, assignment: AssignmentRecord) -> Result<()>;
    async fn list_assignments(&self, user_id: Option<&str>) -> Result<Vec<AssignmentRecord>>;

    async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>>;
    async fn put_submission(&self, id: &str, submission: SubmissionRecord) -> Result<()>;

    /// Update only the code draft of an assignment.
    async fn save_draft(&self, assignment_id: &str, code: &str) -> Result<()> {
        let mut assignment = self
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| ProctorError::not_found("testAssignments", assignment_id))?;
        assignment.code = code.to_string();
        self.put_assignment(assignment).await
    }

    /// Mark an assignment completed with its final code.
    async fn mark_completed(
        &self,
        assignment_id: &str,
        code: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut assignment = self
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| ProctorError::not_found("testAssignments", assignment_id))?;
        assignment.status = proctor_core::AssignmentStatus::Completed;
        assignment.completed_at = Some(completed_at);
        assignment.code = code.to_string();
        self.put_assignment(assignment).await
    }
}

// ─── Identity ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser>;
    async fn sign_out(&self) -> Result<()>;
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser>;
    fn current_user(&self) -> Option<AuthUser>;
    fn watch_user(&self) -> watch::Receiver<Option<AuthUser>>;
}

// ─── Hosted Services ──────────────────────────────────────────────

/// Hosted generative model: one prompt in, free-form text out.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, source: &str, language: Language) -> Result<ExecutionOutput>;
}

// ─── View Layer ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Login,
    Dashboard,
    Admin,
    Test { assignment_id: String },
    Report { assignment_id: String },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Dashboard => "/dashboard".to_string(),
            Self::Admin => "/admin".to_string(),
            Self::Test { assignment_id } => format!("/test/{assignment_id}"),
            Self::Report { assignment_id } => format!("/test/{assignment_id}/report"),
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient toast/alert shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
