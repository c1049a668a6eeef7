//! Operator-trusted identity for the local runtime. Accounts live in the
//! `users` collection; the acting user is chosen with `--as` rather than
//! by password, so no credentials are kept.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use proctor_core::error::{ProctorError, Result};
use proctor_session::ports::{AuthUser, DocumentStore, IdentityProvider};

pub struct LocalIdentity {
    store: Arc<dyn DocumentStore>,
    current: watch::Sender<Option<AuthUser>>,
}

impl LocalIdentity {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            current: watch::channel(None).0,
        }
    }

    /// Act as the stored user `uid`.
    pub async fn act_as(&self, uid: &str) -> Result<AuthUser> {
        let record = self
            .store
            .get_user(uid)
            .await?
            .ok_or_else(|| ProctorError::not_found("users", uid))?;
        let user = AuthUser {
            uid: record.uid,
            email: record.email,
            display_name: record.display_name,
        };
        tracing::debug!(uid = %user.uid, "acting as user");
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthUser> {
        Err(ProctorError::AccessDenied(
            "password sign-in is not available locally; pass --as <uid>".into(),
        ))
    }

    async fn sign_out(&self) -> Result<()> {
        self.current.send_replace(None);
        Ok(())
    }

    async fn create_account(
        &self,
        email: &str,
        _password: &str,
        display_name: &str,
    ) -> Result<AuthUser> {
        let taken = self
            .store
            .list_users(None)
            .await?
            .into_iter()
            .any(|u| u.email.eq_ignore_ascii_case(email));
        if taken {
            return Err(ProctorError::InvalidInput(format!(
                "email already in use: {email}"
            )));
        }
        Ok(AuthUser {
            uid: format!("uid-{}", self.store.generate_id()),
            email: email.to_string(),
            display_name: display_name.to_string(),
        })
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    fn watch_user(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proctor_core::{UserRecord, UserRole};
    use proctor_session::sim::MemoryStore;

    fn store_with(uid: &str, email: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::default());
        store.insert_user(UserRecord {
            uid: uid.into(),
            email: email.into(),
            display_name: "Dana".into(),
            role: UserRole::User,
            created_at: Utc::now(),
        });
        store
    }

    #[tokio::test]
    async fn act_as_sets_current_user() {
        let identity = LocalIdentity::new(store_with("u1", "dana@example.com"));
        let mut watch = identity.watch_user();
        identity.act_as("u1").await.expect("act");
        assert!(watch.has_changed().expect("watch"));
        assert_eq!(identity.current_user().map(|u| u.uid), Some("u1".into()));

        identity.sign_out().await.expect("sign out");
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let identity = LocalIdentity::new(store_with("u1", "dana@example.com"));
        assert!(matches!(
            identity.act_as("ghost").await,
            Err(ProctorError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let identity = LocalIdentity::new(store_with("u1", "dana@example.com"));
        assert!(identity.create_account("DANA@example.com", "secret1", "D").await.is_err());
        let created = identity
            .create_account("lee@example.com", "secret1", "Lee")
            .await
            .expect("create");
        assert!(created.uid.starts_with("uid-"));
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn password_sign_in_is_refused() {
        let identity = LocalIdentity::new(store_with("u1", "dana@example.com"));
        assert!(matches!(
            identity.sign_in("dana@example.com", "x").await,
            Err(ProctorError::AccessDenied(_))
        ));
    }
}
