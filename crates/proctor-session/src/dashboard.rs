//! Candidate dashboard and report view.

use std::sync::Arc;

use serde::Serialize;

use proctor_core::error::{ProctorError, Result};
use proctor_core::{AssignmentRecord, AssignmentStatus, TestRecord, submission_id};

use crate::ports::{DocumentStore, IdentityProvider, Navigator, Route};

pub const NO_SUBMISSION: &str = "No submission found for this test.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardEntry {
    pub assignment: AssignmentRecord,
    /// `None` when the test document was deleted after assignment.
    pub test: Option<TestRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportView {
    pub found: bool,
    pub test_title: Option<String>,
    pub summary: String,
    pub resume: String,
}

pub struct DashboardService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
}

impl DashboardService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            store,
            identity,
            navigator,
        }
    }

    pub async fn assignments_for(&self, user_id: &str) -> Result<Vec<DashboardEntry>> {
        let assignments = self.store.list_assignments(Some(user_id)).await?;
        let mut entries = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let test = self.store.get_test(&assignment.test_id).await?;
            entries.push(DashboardEntry { assignment, test });
        }
        Ok(entries)
    }

    pub async fn my_assignments(&self) -> Result<Vec<DashboardEntry>> {
        let user = self
            .identity
            .current_user()
            .ok_or(ProctorError::NotAuthenticated)?;
        self.assignments_for(&user.uid).await
    }

    /// Open an assignment: the test page while it is pending, the report
    /// once it is completed.
    pub async fn open(&self, assignment_id: &str) -> Result<Route> {
        let user = self
            .identity
            .current_user()
            .ok_or(ProctorError::NotAuthenticated)?;
        let assignment = self
            .store
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| ProctorError::not_found("testAssignments", assignment_id))?;
        if assignment.user_id != user.uid {
            return Err(ProctorError::AccessDenied(format!(
                "assignment {assignment_id} belongs to another user"
            )));
        }
        let route = match assignment.status {
            AssignmentStatus::Completed => Route::Report {
                assignment_id: assignment.id,
            },
            AssignmentStatus::Assigned | AssignmentStatus::InProgress => Route::Test {
                assignment_id: assignment.id,
            },
        };
        self.navigator.navigate(route.clone());
        Ok(route)
    }

    pub async fn report_for(&self, test_id: &str, user_id: &str) -> Result<ReportView> {
        let view = match self.store.get_submission(&submission_id(test_id, user_id)).await? {
            Some(submission) => ReportView {
                found: true,
                test_title: Some(submission.test_title),
                summary: submission.summary_report,
                resume: submission.resume,
            },
            None => ReportView {
                found: false,
                test_title: None,
                summary: NO_SUBMISSION.to_string(),
                resume: String::new(),
            },
        };
        Ok(view)
    }

    /// Report of the signed-in candidate for `test_id`.
    pub async fn load_report(&self, test_id: &str) -> Result<ReportView> {
        let user = self
            .identity
            .current_user()
            .ok_or(ProctorError::NotAuthenticated)?;
        self.report_for(test_id, &user.uid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimEnvironment;

    fn service(env: &SimEnvironment) -> DashboardService {
        DashboardService::new(env.store.clone(), env.identity.clone(), env.routes.clone())
    }

    #[tokio::test]
    async fn lists_own_assignments_with_tests() {
        let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
        env.seed_assignment("a2", "t2", "u2", 30);
        let entries = service(&env).my_assignments().await.expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].assignment.id, "a1");
        assert_eq!(
            entries[0].test.as_ref().map(|t| t.duration_minutes),
            Some(45)
        );
    }

    #[tokio::test]
    async fn open_routes_by_status() {
        let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
        let dashboard = service(&env);
        assert_eq!(
            dashboard.open("a1").await.expect("open"),
            Route::Test {
                assignment_id: "a1".into()
            }
        );
        env.store
            .update_assignment("a1", |a| a.status = AssignmentStatus::Completed);
        assert_eq!(
            dashboard.open("a1").await.expect("open"),
            Route::Report {
                assignment_id: "a1".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_report_has_fallback_text() {
        let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
        let view = service(&env).load_report("t1").await.expect("report");
        assert!(!view.found);
        assert_eq!(view.summary, NO_SUBMISSION);
    }

    #[tokio::test]
    async fn signed_out_user_is_rejected() {
        let env = SimEnvironment::new();
        assert!(matches!(
            service(&env).my_assignments().await,
            Err(ProctorError::NotAuthenticated)
        ));
    }
}
