use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, UserId};

/// Authenticated session issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    user_id: UserId,
    email: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Creates a session from backend-issued tokens.
    #[must_use]
    pub fn new(
        user_id: UserId,
        email: Option<String>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id,
            email,
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Returns the authenticated user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the e-mail the backend returned, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the bearer token for backend calls.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// Returns the refresh token, if the backend issued one.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the access token expiry.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns whether the access token is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// E-mail and password pair submitted at sign-in.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PasswordCredentials {
    email: String,
    password: String,
}

impl PasswordCredentials {
    /// Creates credentials, normalizing the e-mail.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> AppResult<Self> {
        let email = email.into().trim().to_lowercase();
        let password = password.into();

        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation(
                "sign-in e-mail must be a non-empty address".to_owned(),
            ));
        }

        if password.is_empty() {
            return Err(AppError::Validation(
                "sign-in password must not be empty".to_owned(),
            ));
        }

        Ok(Self { email, password })
    }

    /// Returns the normalized e-mail.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the plaintext password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl std::fmt::Debug for PasswordCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PasswordCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Kind of session change pushed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStateChangeKind {
    /// A user signed in.
    SignedIn,
    /// The user signed out or the session was revoked.
    SignedOut,
    /// The access token was refreshed for the same user.
    TokenRefreshed,
    /// The user's stored metadata changed.
    UserUpdated,
}

/// Session change notification pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    /// What happened.
    pub kind: AuthStateChangeKind,
    /// The session after the change, `None` once signed out.
    pub session: Option<AuthSession>,
}
