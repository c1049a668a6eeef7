//! Sign-in with role-based redirect, sign-out, and account creation.

use std::sync::Arc;

use proctor_core::error::{ProctorError, Result};
use proctor_core::{Clock, UserRecord, UserRole};

use crate::ports::{AuthUser, DocumentStore, IdentityProvider, Navigator, Route};

pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            store,
            navigator,
            clock,
        }
    }

    /// Authenticate, look up the role, and redirect: admins to `/admin`,
    /// everyone else to `/dashboard`. A missing `users` document means `User`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(AuthUser, UserRole)> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ProctorError::InvalidInput("Please fill in all fields".into()));
        }
        let user = self.identity.sign_in(email.trim(), password).await?;
        let role = self
            .store
            .get_user(&user.uid)
            .await?
            .map_or(UserRole::User, |record| record.role);

        tracing::info!(uid = %user.uid, %role, "signed in");
        self.navigator.navigate(match role {
            UserRole::Admin => Route::Admin,
            UserRole::User => Route::Dashboard,
        });
        Ok((user, role))
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await?;
        self.navigator.navigate(Route::Login);
        Ok(())
    }

    pub async fn current_role(&self) -> Result<Option<UserRole>> {
        let Some(user) = self.identity.current_user() else {
            return Ok(None);
        };
        Ok(Some(
            self.store
                .get_user(&user.uid)
                .await?
                .map_or(UserRole::User, |record| record.role),
        ))
    }

    /// Create an identity account and its `users` document.
    ///
    /// Requires an admin `actor` once any admin exists; the first admin can
    /// be created without one.
    pub async fn create_user(
        &self,
        actor: Option<&AuthUser>,
        email: &str,
        password: &str,
        display_name: &str,
        role: UserRole,
    ) -> Result<UserRecord> {
        let admins = self.store.list_users(Some(UserRole::Admin)).await?;
        if !admins.is_empty() {
            let actor = actor.ok_or(ProctorError::NotAuthenticated)?;
            require_admin(self.store.as_ref(), actor).await?;
        }
        if email.trim().is_empty() || password.len() < 6 {
            return Err(ProctorError::InvalidInput(
                "email is required and password needs at least 6 characters".into(),
            ));
        }

        let display_name = match display_name.trim() {
            "" => email.trim(),
            name => name,
        };
        let account = self
            .identity
            .create_account(email.trim(), password, display_name)
            .await?;
        let record = UserRecord {
            uid: account.uid,
            email: account.email,
            display_name: account.display_name,
            role,
            created_at: self.clock.now(),
        };
        self.store.put_user(record.clone()).await?;
        tracing::info!(uid = %record.uid, %role, "user created");
        Ok(record)
    }
}

/// `AccessDenied` unless `actor` has an admin `users` document.
pub(crate) async fn require_admin(store: &dyn DocumentStore, actor: &AuthUser) -> Result<()> {
    match store.get_user(&actor.uid).await? {
        Some(user) if user.role == UserRole::Admin => Ok(()),
        _ => Err(ProctorError::AccessDenied(format!(
            "{} is not an administrator",
            actor.email
        ))),
    }
}
