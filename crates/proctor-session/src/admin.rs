//! Admin flows: define tests, list candidates, assign tests.

use std::sync::Arc;

use proctor_core::error::{ProctorError, Result};
use proctor_core::{
    AssignmentRecord, AssignmentStatus, Clock, TestDraft, TestRecord, UserRecord, UserRole,
};

use crate::account::require_admin;
use crate::ports::{AuthUser, DocumentStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    Created(AssignmentRecord),
    /// The candidate already has this test; carries the existing id.
    AlreadyAssigned(String),
}

pub struct AdminService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl AdminService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create_test(&self, actor: &AuthUser, draft: TestDraft) -> Result<TestRecord> {
        require_admin(self.store.as_ref(), actor).await?;
        let record = draft.into_record(self.store.generate_id(), self.clock.now())?;
        self.store.put_test(record.clone()).await?;
        tracing::info!(test_id = %record.id, title = %record.title, "test created");
        Ok(record)
    }

    pub async fn list_tests(&self, actor: &AuthUser) -> Result<Vec<TestRecord>> {
        require_admin(self.store.as_ref(), actor).await?;
        self.store.list_tests().await
    }

    pub async fn list_candidates(&self, actor: &AuthUser) -> Result<Vec<UserRecord>> {
        require_admin(self.store.as_ref(), actor).await?;
        self.store.list_users(Some(UserRole::User)).await
    }

    pub async fn list_assignments(&self, actor: &AuthUser) -> Result<Vec<AssignmentRecord>> {
        require_admin(self.store.as_ref(), actor).await?;
        self.store.list_assignments(None).await
    }

    /// Assign `test_id` to `user_id` unless that pair already exists.
    pub async fn assign_test(
        &self,
        actor: &AuthUser,
        test_id: &str,
        user_id: &str,
    ) -> Result<AssignOutcome> {
        require_admin(self.store.as_ref(), actor).await?;
        if test_id.is_empty() || user_id.is_empty() {
            return Err(ProctorError::InvalidInput(
                "select both a test and a user".into(),
            ));
        }
        self.store
            .get_test(test_id)
            .await?
            .ok_or_else(|| ProctorError::not_found("tests", test_id))?;
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ProctorError::not_found("users", user_id))?;

        let existing = self.store.list_assignments(Some(user_id)).await?;
        if let Some(found) = existing.into_iter().find(|a| a.test_id == test_id) {
            tracing::debug!(assignment_id = %found.id, "already assigned");
            return Ok(AssignOutcome::AlreadyAssigned(found.id));
        }

        let record = AssignmentRecord {
            id: self.store.generate_id(),
            test_id: test_id.to_string(),
            user_id: user_id.to_string(),
            status: AssignmentStatus::Assigned,
            assigned_at: self.clock.now(),
            started_at: None,
            completed_at: None,
            code: String::new(),
            question: None,
        };
        self.store.put_assignment(record.clone()).await?;
        tracing::info!(assignment_id = %record.id, test_id, user_id, "test assigned");
        Ok(AssignOutcome::Created(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountService;
    use crate::sim::SimEnvironment;

    async fn admin(env: &SimEnvironment) -> AuthUser {
        let accounts = AccountService::new(
            env.identity.clone(),
            env.store.clone(),
            env.routes.clone(),
            env.clock.clone(),
        );
        let record = accounts
            .create_user(None, "admin@example.com", "secret1", "Admin", UserRole::Admin)
            .await
            .expect("admin");
        AuthUser {
            uid: record.uid,
            email: record.email,
            display_name: record.display_name,
        }
    }

    fn draft() -> TestDraft {
        let mut draft = TestDraft {
            title: " Rust Backend ".into(),
            role: "Backend Engineer".into(),
            duration_minutes: 45,
            viva_enabled: true,
            ..TestDraft::default()
        };
        draft.add_topic("rust");
        draft.add_topic("rust ");
        draft.add_topic("tokio");
        draft
    }

    #[tokio::test]
    async fn create_and_assign_once() {
        let env = SimEnvironment::new();
        let actor = admin(&env).await;
        let service = AdminService::new(env.store.clone(), env.clock.clone());

        let test = service.create_test(&actor, draft()).await.expect("create");
        assert_eq!(test.title, "Rust Backend");
        assert_eq!(test.topics.len(), 2);

        env.seed_assignment("seed", "other-test", "cand", 30);
        let first = service.assign_test(&actor, &test.id, "cand").await.expect("assign");
        let AssignOutcome::Created(record) = first else {
            panic!("expected a new assignment");
        };
        assert_eq!(record.status, AssignmentStatus::Assigned);

        let second = service.assign_test(&actor, &test.id, "cand").await.expect("assign again");
        assert_eq!(second, AssignOutcome::AlreadyAssigned(record.id));
        assert_eq!(service.list_assignments(&actor).await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn candidates_exclude_admins() {
        let env = SimEnvironment::new();
        let actor = admin(&env).await;
        env.seed_assignment("a1", "t1", "cand", 30);
        let service = AdminService::new(env.store.clone(), env.clock.clone());
        let candidates = service.list_candidates(&actor).await.expect("list");
        let ids: Vec<_> = candidates.iter().map(|u| u.uid.as_str()).collect();
        assert_eq!(ids, vec!["cand"]);
    }

    #[tokio::test]
    async fn non_admin_is_denied() {
        let env = SimEnvironment::new();
        env.seed_assignment("a1", "t1", "cand", 30);
        let service = AdminService::new(env.store.clone(), env.clock.clone());
        let cand = AuthUser {
            uid: "cand".into(),
            email: "cand@example.com".into(),
            display_name: "cand".into(),
        };
        assert!(matches!(
            service.create_test(&cand, draft()).await,
            Err(ProctorError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let env = SimEnvironment::new();
        let actor = admin(&env).await;
        let service = AdminService::new(env.store.clone(), env.clock.clone());
        let test = service.create_test(&actor, draft()).await.expect("create");
        assert!(matches!(
            service.assign_test(&actor, &test.id, "ghost").await,
            Err(ProctorError::NotFound { collection: "users", .. })
        ));
    }
}
