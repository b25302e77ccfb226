mod repository;
mod service;

pub use repository::*;
pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(skip)]
    pub lockout_enabled: bool,
    #[serde(skip)]
    pub failed_access_count: i32,
    #[serde(skip)]
    pub lockout_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// User created through the registration form.
    ///
    /// Lockout is disabled at creation; the password hash is set by the
    /// credential store, never here.
    pub fn local(
        email: impl Into<String>,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            username: username.into(),
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            password: None,
            lockout_enabled: false,
            failed_access_count: 0,
            lockout_end: None,
            created_at: Utc::now(),
        }
    }

    /// User created on first successful external login.
    ///
    /// The email doubles as username; there is no local password.
    pub fn external(
        email: impl Into<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        let email = email.into();
        Self {
            id: Uuid::new_v4(),
            username: email.clone(),
            email,
            first_name,
            last_name,
            password: None,
            lockout_enabled: false,
            failed_access_count: 0,
            lockout_end: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the account is currently blocked.
    ///
    /// A stamped `lockout_end` only counts while the flag is enabled.
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.is_some_and(|end| end > now)
    }
}

/// Association of an external identity with a local account.
///
/// At most one user per `(provider, provider_key)` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalLogin {
    pub provider: String,
    pub provider_key: String,
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_external_user_defaults() {
        let user = User::external("a@b.test", Some("Ada".into()), None);

        assert_eq!(user.username, "a@b.test");
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert!(user.password.is_none());
        assert!(!user.lockout_enabled);
    }

    #[test]
    fn test_lockout_requires_enabled_flag() {
        let now = Utc::now();
        let mut user = User::local("a@b.test", "ada", "Ada", "Lovelace");
        user.lockout_end = Some(now + Duration::minutes(1));

        // stamped but disabled: not locked out.
        assert!(!user.is_locked_out(now));

        user.lockout_enabled = true;
        assert!(user.is_locked_out(now));

        user.lockout_end = Some(now - Duration::minutes(1));
        assert!(!user.is_locked_out(now));
    }
}
