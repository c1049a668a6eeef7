use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProctorError;

// ─── Test Configuration ───────────────────────────────────────────

/// Immutable snapshot of a test, taken once when the attempt starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    pub title: String,
    pub role: String,
    pub topics: BTreeSet<String>,
    pub duration_seconds: u64,
    pub viva_enabled: bool,
}

impl TestConfig {
    pub fn topic_list(&self) -> Vec<String> {
        self.topics.iter().cloned().collect()
    }

    pub fn duration_minutes(&self) -> u64 {
        self.duration_seconds / 60
    }
}

// ─── Session Status ───────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    Active,
    Submitting,
    Completed,
    /// Abandoned before completion (navigation away, teardown).
    Stopped,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Submitting => "submitting",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Warnings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Face count in the camera frame was not exactly one.
    PresenceViolation,
    /// Page visibility lost (tab switch, minimize).
    FocusViolation,
    /// A blocked keyboard shortcut was pressed.
    ShortcutViolation,
}

impl WarningKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PresenceViolation => "presence_violation",
            Self::FocusViolation => "focus_violation",
            Self::ShortcutViolation => "shortcut_violation",
        }
    }

    /// Text shown in the warning modal.
    pub fn message(self) -> &'static str {
        match self {
            Self::PresenceViolation => "Please keep only your face in view.",
            Self::FocusViolation => "Switching tabs is not allowed.",
            Self::ShortcutViolation => "Shortcuts are disabled during the test.",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub timestamp: DateTime<Utc>,
}

// ─── Viva ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VivaAnswer {
    pub question: String,
    pub answer: String,
}

// ─── Stored Records ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ProctorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(ProctorError::InvalidInput(format!("unknown role: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: String,
    pub title: String,
    pub role: String,
    pub topics: BTreeSet<String>,
    pub duration_minutes: u64,
    pub viva_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl TestRecord {
    pub fn config(&self) -> TestConfig {
        TestConfig {
            title: self.title.clone(),
            role: self.role.clone(),
            topics: self.topics.clone(),
            duration_seconds: self.duration_minutes * 60,
            viva_enabled: self.viva_enabled,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: String,
    pub test_id: String,
    pub user_id: String,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Last persisted code draft (or final code once completed).
    #[serde(default)]
    pub code: String,
    /// Practical question generated at first start, reused on reload.
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub user_id: String,
    pub test_id: String,
    pub assignment_id: String,
    pub test_title: String,
    pub role: String,
    pub topics: Vec<String>,
    pub coding_question: String,
    pub code: String,
    pub viva: Vec<VivaAnswer>,
    pub warnings: Vec<Warning>,
    pub summary_report: String,
    pub resume: String,
    pub submitted_at: DateTime<Utc>,
}

/// Composite key of a submission: one per (test, candidate).
pub fn submission_id(test_id: &str, user_id: &str) -> String {
    format!("{test_id}_{user_id}")
}

// ─── Code Execution ───────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Cpp,
    Java,
    JavaScript,
}

impl Language {
    pub const ALL: [Self; 4] = [Self::Python, Self::Cpp, Self::Java, Self::JavaScript];

    /// Numeric language id understood by the execution service.
    pub fn id(self) -> u32 {
        match self {
            Self::Python => 71,
            Self::Cpp => 54,
            Self::Java => 62,
            Self::JavaScript => 63,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::JavaScript => "javascript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ProctorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" | "71" => Ok(Self::Python),
            "cpp" | "c++" | "54" => Ok(Self::Cpp),
            "java" | "62" => Ok(Self::Java),
            "javascript" | "js" | "node" | "63" => Ok(Self::JavaScript),
            _ => Err(ProctorError::InvalidInput(format!("unknown language: {s}"))),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutput {
    /// Console text: stderr wins when present.
    pub fn render(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("Error occurred:\n{}", self.stderr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_id_is_composite() {
        assert_eq!(submission_id("t1", "u9"), "t1_u9");
    }

    #[test]
    fn language_ids_match_execution_service() {
        let ids: Vec<u32> = Language::ALL.iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec![71, 54, 62, 63]);
        assert_eq!("JS".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("62".parse::<Language>().unwrap(), Language::Java);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn execution_output_prefers_stderr() {
        let ok = ExecutionOutput {
            stdout: "42\n".into(),
            stderr: String::new(),
        };
        assert_eq!(ok.render(), "42\n");
        let failed = ExecutionOutput {
            stdout: "partial".into(),
            stderr: "NameError".into(),
        };
        assert_eq!(failed.render(), "Error occurred:\nNameError");
    }

    #[test]
    fn test_record_config_converts_minutes() {
        let record = TestRecord {
            id: "t1".into(),
            title: "Backend".into(),
            role: "SRE".into(),
            topics: ["rust".to_string()].into_iter().collect(),
            duration_minutes: 45,
            viva_enabled: true,
            created_at: Utc::now(),
        };
        let config = record.config();
        assert_eq!(config.duration_seconds, 2700);
        assert_eq!(config.duration_minutes(), 45);
        assert_eq!(config.topic_list(), vec!["rust".to_string()]);
    }

    #[test]
    fn status_serde_is_snake_case() {
        let json = serde_json::to_string(&SessionStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
        let json = serde_json::to_string(&AssignmentStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert!(SessionStatus::Stopped.is_terminal());
        assert!(!SessionStatus::Submitting.is_terminal());
    }
}
