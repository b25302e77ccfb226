//! Sign-in and registration decisions for the credential store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::config::Lockout;
use crate::crypto::PasswordManager;
use crate::error::{Result, ServerError};
use crate::user::{User, UserRepository, repository::is_unique_violation};

/// Outcome of a user creation attempt.
#[derive(Debug, PartialEq)]
pub enum Registration {
    Created,
    /// Store-reported reasons, one message each.
    Rejected(Vec<String>),
}

/// Outcome of a password sign-in attempt.
#[derive(Debug, PartialEq)]
pub enum SignIn {
    Success,
    LockedOut,
    Failed {
        remaining_tries: i32,
    },
}

/// Outcome of an external sign-in attempt.
#[derive(Debug, PartialEq)]
pub enum ExternalSignIn {
    Success(User),
    LockedOut,
    NotLinked,
}

/// Credential store service.
#[derive(Clone)]
pub struct UserService {
    pub repo: UserRepository,
    crypto: Arc<PasswordManager>,
    max_failed: i32,
    lockout_window: Duration,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        pool: PgPool,
        crypto: Arc<PasswordManager>,
        lockout: &Lockout,
    ) -> Self {
        Self {
            repo: UserRepository::new(pool),
            crypto,
            max_failed: lockout.max_failed_attempts,
            lockout_window: Duration::minutes(lockout.duration_minutes),
        }
    }

    /// Hash the password and insert the user.
    ///
    /// A duplicate email becomes a [`Registration::Rejected`] with the
    /// store-reported reason, never an error.
    pub async fn register(
        &self,
        user: &mut User,
        password: &str,
    ) -> Result<Registration> {
        user.password = Some(self.crypto.hash_password(password)?);

        match self.repo.insert(user).await {
            Ok(()) => Ok(Registration::Created),
            Err(ServerError::Sql(err)) if is_unique_violation(&err) => {
                Ok(Registration::Rejected(vec![format!(
                    "Email '{}' is already taken.",
                    user.email
                )]))
            },
            Err(err) => Err(err),
        }
    }

    /// Insert a user created through an external login (no password).
    pub async fn create_external(&self, user: &User) -> Result<Registration> {
        match self.repo.insert(user).await {
            Ok(()) => Ok(Registration::Created),
            Err(ServerError::Sql(err)) if is_unique_violation(&err) => {
                Ok(Registration::Rejected(vec![format!(
                    "Email '{}' is already taken.",
                    user.email
                )]))
            },
            Err(err) => Err(err),
        }
    }

    /// Password sign-in with lockout tracking.
    ///
    /// A blocked account fails before the password is checked, even with
    /// the correct one. A wrong password always increments the failure
    /// counter; hitting the maximum stamps the lockout window and resets
    /// the counter, whether or not the account honors lockout.
    pub async fn password_sign_in(
        &self,
        user: &User,
        password: &str,
    ) -> Result<SignIn> {
        let now = Utc::now();
        if user.is_locked_out(now) {
            return Ok(SignIn::LockedOut);
        }

        let valid = user
            .password
            .as_deref()
            .is_some_and(|hash| self.crypto.verify(password, hash));

        if valid {
            self.repo.reset_access_failures(user.id).await?;
            return Ok(SignIn::Success);
        }

        let (count, lockout_end) = self
            .repo
            .record_access_failure(user.id, self.max_failed, now + self.lockout_window)
            .await?;

        if user.lockout_enabled && lockout_end.is_some_and(|end| end > now) {
            Ok(SignIn::LockedOut)
        } else {
            Ok(SignIn::Failed {
                remaining_tries: self.max_failed - count,
            })
        }
    }

    /// Sign-in through a linked external identity.
    ///
    /// Bypasses any second factor; still honors lockout.
    pub async fn external_sign_in(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<ExternalSignIn> {
        match self.repo.find_by_external_login(provider, provider_key).await? {
            None => Ok(ExternalSignIn::NotLinked),
            Some(user) if user.is_locked_out(Utc::now()) => {
                Ok(ExternalSignIn::LockedOut)
            },
            Some(user) => Ok(ExternalSignIn::Success(user)),
        }
    }
}
