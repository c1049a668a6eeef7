//! The persisted half of the Submission Transition: generate the report,
//! write the submission document, and mark the assignment completed.

use chrono::{DateTime, Utc};

use proctor_core::content::ReportInput;
use proctor_core::error::{ProctorError, Result};
use proctor_core::{SubmissionRecord, TestConfig, VivaAnswer, Warning, submission_id};

use crate::generation::ContentService;
use crate::ports::DocumentStore;

/// Session state frozen at the start of the transition.
#[derive(Debug, Clone)]
pub struct FinalArtifact {
    pub assignment_id: String,
    pub test_id: String,
    pub user_id: String,
    pub config: TestConfig,
    pub question: String,
    pub code: String,
    pub viva: Vec<VivaAnswer>,
    pub warnings: Vec<Warning>,
}

/// Generate report content and persist the submission. Generation never
/// fails; store errors are returned as `PersistenceFailure`.
pub async fn finalize(
    artifact: &FinalArtifact,
    content: &ContentService,
    store: &dyn DocumentStore,
    submitted_at: DateTime<Utc>,
) -> Result<String> {
    let topics = artifact.config.topic_list();
    let summary = content
        .summary_report(&ReportInput {
            test_title: &artifact.config.title,
            role: &artifact.config.role,
            topics: &topics,
            question: &artifact.question,
            code: &artifact.code,
            viva: &artifact.viva,
            warnings: &artifact.warnings,
        })
        .await;
    let resume = content
        .ats_resume(
            &artifact.config.role,
            &artifact.config.title,
            &topics,
            &artifact.code,
            &summary,
        )
        .await;

    let id = submission_id(&artifact.test_id, &artifact.user_id);
    let record = SubmissionRecord {
        user_id: artifact.user_id.clone(),
        test_id: artifact.test_id.clone(),
        assignment_id: artifact.assignment_id.clone(),
        test_title: artifact.config.title.clone(),
        role: artifact.config.role.clone(),
        topics,
        coding_question: artifact.question.clone(),
        code: artifact.code.clone(),
        viva: artifact.viva.clone(),
        warnings: artifact.warnings.clone(),
        summary_report: summary,
        resume,
        submitted_at,
    };

    store
        .put_submission(&id, record)
        .await
        .map_err(into_persistence)?;
    store
        .mark_completed(&artifact.assignment_id, &artifact.code, submitted_at)
        .await
        .map_err(into_persistence)?;

    tracing::info!(
        assignment_id = %artifact.assignment_id,
        submission_id = %id,
        warnings = artifact.warnings.len(),
        "submission persisted"
    );
    Ok(id)
}

fn into_persistence(err: ProctorError) -> ProctorError {
    match err {
        ProctorError::PersistenceFailure(_) | ProctorError::NotAuthenticated => err,
        other => ProctorError::PersistenceFailure(other.to_string()),
    }
}
