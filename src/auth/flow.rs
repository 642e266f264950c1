//! Auth flow orchestration.
//!
//! Each method is one boundary operation: validate the payload, then drive the
//! stores, the hasher and the session issuer. Store outcomes are mapped into
//! [`AuthError`] here with operation-specific messages.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::{code, password::PasswordHasher, session::IssuedSession, validate, AuthError, SessionIssuer};
use crate::{
    billing::CustomerProvisioner,
    email::{verification_email, EmailSender},
    store::{NewUser, StoreError, User, UserStore, VerificationStore},
};

pub const DEFAULT_APP_NAME: &str = "Zero";

#[derive(Clone)]
pub struct AuthFlow {
    users: UserStore,
    codes: VerificationStore,
    hasher: PasswordHasher,
    sessions: SessionIssuer,
    provisioner: Arc<dyn CustomerProvisioner>,
    mailer: Arc<dyn EmailSender>,
    app_name: String,
}

impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("app_name", &self.app_name)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl AuthFlow {
    #[must_use]
    pub fn new(
        users: UserStore,
        codes: VerificationStore,
        hasher: PasswordHasher,
        sessions: SessionIssuer,
        provisioner: Arc<dyn CustomerProvisioner>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            codes,
            hasher,
            sessions,
            provisioner,
            mailer,
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    #[cfg(test)]
    pub(crate) fn users(&self) -> &UserStore {
        &self.users
    }

    /// Register a new unverified user and return its id.
    ///
    /// # Errors
    /// `Validation`, `Conflict` on a taken username or email, `Internal`.
    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<i64, AuthError> {
        let email = validate::normalize_email(email);
        validate::username(username)?;
        validate::email(&email)?;
        validate::password(password)?;

        let password_hash = self.hash_password(password).await?;
        let customer = self.provisioner.create_customer(username, &email).await;

        let id = self
            .users
            .create(&NewUser {
                customer: &customer,
                username,
                email: &email,
                password_hash: &password_hash,
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict => AuthError::Conflict("Username or email already exists"),
                other => AuthError::from(other),
            })?;
        info!(user_id = id, "user created");
        Ok(id)
    }

    /// Check credentials and mint a session.
    ///
    /// # Errors
    /// `Validation`, `NotFound` for an unknown email, `Unauthorized` for a wrong password.
    pub async fn signin(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let email = validate::normalize_email(email);
        validate::email(&email)?;
        validate::password(password)?;

        let user = self.users.find_by_email(&email).await?;
        if !self.verify_password(&user.password, password).await? {
            return Err(AuthError::Unauthorized("Wrong password"));
        }
        self.sessions.issue(user.id)
    }

    /// Issue a fresh code and mail it. Earlier outstanding codes stay valid.
    ///
    /// # Errors
    /// `Validation`, `NotFound` for an unknown email, `Internal` when the store or
    /// the mailer fails.
    pub async fn send_verification_email(&self, email: &str) -> Result<(), AuthError> {
        let email = validate::normalize_email(email);
        validate::email(&email)?;

        let code = code::generate_code();
        let user = self.users.find_by_email(&email).await?;
        self.codes.issue_code(user.id, &code).await?;

        let message = verification_email(&self.app_name, &user.email, &user.username, &code);
        if let Err(err) = self.mailer.send(&message).await {
            error!(user_id = user.id, "Failed to send verification email: {err:#}");
            return Err(AuthError::Internal);
        }
        info!(user_id = user.id, "verification email sent");
        Ok(())
    }

    /// Consume a code and mark the user verified.
    ///
    /// # Errors
    /// `Validation`, `NotFound` for an unknown email or code, `Expired`.
    pub async fn complete_verification(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let email = validate::normalize_email(email);
        let code = code::normalize_code(code);
        validate::email(&email)?;
        validate::code(&code)?;

        let user = self.users.find_by_email(&email).await?;
        self.codes
            .consume(user.id, &code)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => AuthError::NotFound("Invalid verification code"),
                other => AuthError::from(other),
            })?;
        self.codes.mark_verified(user.id).await?;
        info!(user_id = user.id, "email verified");
        Ok(())
    }

    /// Resolve a session token into a verified user.
    ///
    /// # Errors
    /// `Unauthorized` for a bad token or a deleted user, `Forbidden` when the
    /// email is not verified yet.
    pub async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let user_id = self.sessions.extract(token)?;
        let user = self.users.find_by_id(user_id).await.map_err(|err| match err {
            StoreError::NotFound => AuthError::Unauthorized("User not found"),
            other => AuthError::from(other),
        })?;
        if !user.verified {
            return Err(AuthError::Forbidden);
        }
        Ok(user)
    }

    /// # Errors
    /// `Validation`, `NotFound` when `old` is not the current name, `Conflict`.
    pub async fn update_username(&self, user: &User, new: &str, old: &str) -> Result<(), AuthError> {
        validate::username(new)?;
        validate::username(old)?;
        if user.username != old {
            warn!(user_id = user.id, "username update with wrong current name");
            return Err(AuthError::NotFound("Username not found"));
        }
        self.users
            .update_username(user.id, new, old)
            .await
            .map_err(|err| match err {
                StoreError::Conflict => AuthError::Conflict("Username already taken"),
                StoreError::NotFound => AuthError::NotFound("Username not found"),
                other => AuthError::from(other),
            })
    }

    /// # Errors
    /// `Validation`, `NotFound` when `old` is not the current email, `Conflict`.
    pub async fn update_email(&self, user: &User, new: &str, old: &str) -> Result<(), AuthError> {
        let new = validate::normalize_email(new);
        let old = validate::normalize_email(old);
        validate::email(&new)?;
        validate::email(&old)?;
        if user.email != old {
            warn!(user_id = user.id, "email update with wrong current email");
            return Err(AuthError::NotFound("Email not found"));
        }
        self.users
            .update_email(user.id, &new, &old)
            .await
            .map_err(|err| match err {
                StoreError::Conflict => AuthError::Conflict("Email already used"),
                StoreError::NotFound => AuthError::NotFound("Email not found"),
                other => AuthError::from(other),
            })
    }

    /// # Errors
    /// `Validation`, `NotFound` if the user is gone, `Internal`.
    pub async fn update_password(&self, user: &User, password: &str) -> Result<(), AuthError> {
        validate::password(password)?;
        let password_hash = self.hash_password(password).await?;
        self.users.update_password(user.id, &password_hash).await?;
        Ok(())
    }

    /// Delete the account after the plaintext password is confirmed.
    ///
    /// # Errors
    /// `Validation`, `Unauthorized` on a wrong password, `NotFound` if already gone.
    pub async fn delete_account(&self, user: &User, password: &str) -> Result<(), AuthError> {
        validate::password(password)?;
        if !self.verify_password(&user.password, password).await? {
            warn!(user_id = user.id, "account deletion with wrong password");
            return Err(AuthError::Unauthorized("Wrong password"));
        }
        self.users.delete(user.id).await?;
        info!(user_id = user.id, "account deleted");
        Ok(())
    }

    /// Billing customer for checkout, provisioned and stored on first use.
    /// Returns `""` when the provider could not create one.
    ///
    /// # Errors
    /// `Internal` if persisting the new reference fails.
    pub async fn ensure_customer(&self, user: &User) -> Result<String, AuthError> {
        if !user.customer.is_empty() {
            return Ok(user.customer.clone());
        }
        let customer = self
            .provisioner
            .create_customer(&user.username, &user.email)
            .await;
        if !customer.is_empty() {
            self.users.set_customer(user.id, &customer).await?;
        }
        Ok(customer)
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| {
                error!("Password hashing task failed: {err}");
                AuthError::Internal
            })?
            .map_err(|err| {
                error!("Failed to hash password: {err}");
                AuthError::Internal
            })
    }

    async fn verify_password(&self, hash: &str, password: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let hash = hash.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.compare(&hash, &password))
            .await
            .map_err(|err| {
                error!("Password verification task failed: {err}");
                AuthError::Internal
            })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{harness, harness_with, FixedProvisioner, Harness};
    use super::*;
    use anyhow::{Context, Result};
    use chrono::Duration;

    const PASSWORD: &str = "Str0ng!Pass12";

    async fn verified_user(h: &Harness) -> Result<User> {
        h.flow.signup("alice", "a@x.com", PASSWORD).await?;
        h.flow.send_verification_email("a@x.com").await?;
        let code = h.mailer.last_code().context("no code mailed")?;
        h.flow.complete_verification("a@x.com", &code).await?;
        let session = h.flow.signin("a@x.com", PASSWORD).await?;
        Ok(h.flow.current_user(&session.token).await?)
    }

    #[tokio::test]
    async fn signup_twice_conflicts() -> Result<()> {
        let h = harness().await?;
        h.flow.signup("alice", "a@x.com", PASSWORD).await?;
        assert!(matches!(
            h.flow.signup("alice", "b@x.com", PASSWORD).await,
            Err(AuthError::Conflict(_))
        ));
        assert!(matches!(
            h.flow.signup("bob", "A@X.com", PASSWORD).await,
            Err(AuthError::Conflict(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn signup_validates_and_stores_hash() -> Result<()> {
        let h = harness_with(Arc::new(FixedProvisioner("cus_1"))).await?;
        assert!(matches!(
            h.flow.signup("1alice", "a@x.com", PASSWORD).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            h.flow.signup("alice", "a@x.com", "weakpassword").await,
            Err(AuthError::Validation(_))
        ));

        let id = h.flow.signup("alice", " A@X.com ", PASSWORD).await?;
        let user = h.flow.users().find_by_id(id).await?;
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.customer, "cus_1");
        assert_ne!(user.password, PASSWORD);
        assert!(!user.verified);
        Ok(())
    }

    #[tokio::test]
    async fn signin_outcomes() -> Result<()> {
        let h = harness().await?;
        let id = h.flow.signup("alice", "a@x.com", PASSWORD).await?;

        assert!(matches!(
            h.flow.signin("nobody@x.com", PASSWORD).await,
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            h.flow.signin("a@x.com", "Wr0ng!Pass123").await,
            Err(AuthError::Unauthorized(_))
        ));

        let session = h.flow.signin("a@x.com", PASSWORD).await?;
        assert_eq!(h.flow.sessions.extract(&session.token)?, id);
        Ok(())
    }

    #[tokio::test]
    async fn verification_lifecycle() -> Result<()> {
        let h = harness().await?;
        let id = h.flow.signup("alice", "a@x.com", PASSWORD).await?;
        h.flow.send_verification_email("a@x.com").await?;
        let code = h.mailer.last_code().context("no code mailed")?;

        h.flow
            .complete_verification("a@x.com", &code.to_lowercase())
            .await?;
        assert!(h.flow.users().is_verified(id).await?);

        assert!(matches!(
            h.flow.complete_verification("a@x.com", &code).await,
            Err(AuthError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn verification_code_expires() -> Result<()> {
        let h = harness().await?;
        h.flow.signup("alice", "a@x.com", PASSWORD).await?;
        h.flow.send_verification_email("a@x.com").await?;
        let code = h.mailer.last_code().context("no code mailed")?;

        h.clock.advance(Duration::minutes(16));
        assert!(matches!(
            h.flow.complete_verification("a@x.com", &code).await,
            Err(AuthError::Expired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn send_to_unknown_email_is_not_found() -> Result<()> {
        let h = harness().await?;
        assert!(matches!(
            h.flow.send_verification_email("nobody@x.com").await,
            Err(AuthError::NotFound(_))
        ));
        assert_eq!(h.mailer.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unverified_user_is_forbidden() -> Result<()> {
        let h = harness().await?;
        h.flow.signup("alice", "a@x.com", PASSWORD).await?;
        let session = h.flow.signin("a@x.com", PASSWORD).await?;
        assert!(matches!(
            h.flow.current_user(&session.token).await,
            Err(AuthError::Forbidden)
        ));
        assert!(matches!(
            h.flow.current_user("bogus").await,
            Err(AuthError::Unauthorized(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn update_username_requires_current_name() -> Result<()> {
        let h = harness().await?;
        let user = verified_user(&h).await?;

        assert!(matches!(
            h.flow.update_username(&user, "alicia", "bobby").await,
            Err(AuthError::NotFound(_))
        ));
        h.flow.update_username(&user, "alicia", "alice").await?;

        // A stale snapshot still says "alice"; the conditional update must not apply.
        assert!(matches!(
            h.flow.update_username(&user, "ally", "alice").await,
            Err(AuthError::NotFound(_))
        ));
        assert_eq!(h.flow.users().find_by_id(user.id).await?.username, "alicia");
        Ok(())
    }

    #[tokio::test]
    async fn update_email_conflict_and_success() -> Result<()> {
        let h = harness().await?;
        let user = verified_user(&h).await?;
        h.flow.signup("bob", "b@x.com", PASSWORD).await?;

        assert!(matches!(
            h.flow.update_email(&user, "b@x.com", "a@x.com").await,
            Err(AuthError::Conflict(_))
        ));
        h.flow.update_email(&user, "New@X.com", "a@x.com").await?;
        let stored = h.flow.users().find_by_id(user.id).await?;
        assert_eq!(stored.email, "new@x.com");
        assert!(stored.verified);
        Ok(())
    }

    #[tokio::test]
    async fn update_password_rehashes() -> Result<()> {
        let h = harness().await?;
        let user = verified_user(&h).await?;
        h.flow.update_password(&user, "N3w!Password99").await?;

        assert!(matches!(
            h.flow.signin("a@x.com", PASSWORD).await,
            Err(AuthError::Unauthorized(_))
        ));
        h.flow.signin("a@x.com", "N3w!Password99").await?;
        Ok(())
    }

    #[tokio::test]
    async fn delete_requires_password() -> Result<()> {
        let h = harness().await?;
        let user = verified_user(&h).await?;

        assert!(matches!(
            h.flow.delete_account(&user, "Wr0ng!Pass123").await,
            Err(AuthError::Unauthorized(_))
        ));
        h.flow.delete_account(&user, PASSWORD).await?;
        assert!(matches!(
            h.flow.users().find_by_id(user.id).await,
            Err(StoreError::NotFound)
        ));
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&h.pool)
            .await?;
        assert_eq!(remaining, 0);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_customer_provisions_once() -> Result<()> {
        let h = harness_with(Arc::new(FixedProvisioner(""))).await?;
        let user = verified_user(&h).await?;
        assert_eq!(h.flow.ensure_customer(&user).await?, "");

        let h = harness_with(Arc::new(FixedProvisioner("cus_9"))).await?;
        let id = h.flow.signup("carol", "c@x.com", PASSWORD).await?;
        let mut user = h.flow.users().find_by_id(id).await?;
        assert_eq!(user.customer, "cus_9");

        user.customer.clear();
        assert_eq!(h.flow.ensure_customer(&user).await?, "cus_9");
        assert_eq!(h.flow.users().find_by_id(id).await?.customer, "cus_9");
        Ok(())
    }
}
