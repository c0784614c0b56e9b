//! Adapter for a Supabase-style hosted backend.
//!
//! Speaks the GoTrue auth endpoints for sign-in and sign-out, the PostgREST
//! `profiles` table for role lookups and the admin user API for the team
//! directory.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use tinspace_application::{AuthBackend, ProfileRecord, SignUpRequest};
use tinspace_core::{
    AppError, AppResult, AuthSession, AuthStateChange, AuthStateChangeKind, PasswordCredentials,
};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use url::Url;

use crate::SupabaseConfig;

mod team_directory;
mod wire;

#[cfg(test)]
mod tests;

use wire::{
    PasswordGrantBody, ProfileRow, SignUpBody, SignUpMetadata, SignUpResponse, TokenResponse,
    error_message,
};

const AUTH_EVENT_CAPACITY: usize = 16;
const SINGLE_OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

/// HTTP adapter implementing the authentication and team directory ports.
pub struct SupabaseAuthBackend {
    http_client: reqwest::Client,
    config: SupabaseConfig,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl SupabaseAuthBackend {
    /// Creates an adapter with its own HTTP client.
    pub fn new(config: SupabaseConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build backend HTTP client: {error}"))
            })?;

        Ok(Self::with_client(http_client, config))
    }

    /// Creates an adapter over an existing HTTP client.
    #[must_use]
    pub fn with_client(http_client: reqwest::Client, config: SupabaseConfig) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            http_client,
            config,
            session: RwLock::new(None),
            events,
        }
    }

    /// Installs a previously issued session, e.g. restored from storage.
    pub async fn restore_session(&self, session: AuthSession) {
        if session.is_expired_at(Utc::now()) {
            warn!(user_id = %session.user_id(), "restoring an expired session");
        }

        *self.session.write().await = Some(session.clone());
        self.publish(AuthStateChangeKind::SignedIn, Some(session));
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.config.base_url().join(path).map_err(|error| {
            AppError::Internal(format!("invalid backend endpoint '{path}': {error}"))
        })
    }

    fn publish(&self, kind: AuthStateChangeKind, session: Option<AuthSession>) {
        // No receiver is not an error: nobody listens yet.
        let _ = self.events.send(AuthStateChange { kind, session });
    }
}

#[async_trait]
impl AuthBackend for SupabaseAuthBackend {
    async fn current_session(&self) -> AppResult<Option<AuthSession>> {
        Ok(self.session.read().await.clone())
    }

    async fn fetch_profile(&self, session: &AuthSession) -> AppResult<Option<ProfileRecord>> {
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("id", format!("eq.{}", session.user_id()).as_str())
            .append_pair("select", "full_name,role,avatar_url,permissions");

        let response = self
            .http_client
            .get(url)
            .header("apikey", self.config.anon_key())
            .bearer_auth(session.access_token())
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT_MEDIA_TYPE)
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("profile request transport error: {error}"))
            })?;

        let status = response.status();
        // PostgREST answers 406 when a single-object request matches no row.
        if status == StatusCode::NOT_ACCEPTABLE {
            debug!(user_id = %session.user_id(), "no profile row");
            return Ok(None);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            return Err(AppError::Internal(format!(
                "profile request failed with status {status}: {}",
                error_message(body.as_str())
            )));
        }

        let row = response.json::<ProfileRow>().await.map_err(|error| {
            AppError::Internal(format!("failed to decode profile response: {error}"))
        })?;

        Ok(Some(row.into()))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> AppResult<AuthSession> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http_client
            .post(url)
            .header("apikey", self.config.anon_key())
            .json(&PasswordGrantBody {
                email: credentials.email(),
                password: credentials.password(),
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("sign-in request transport error: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            let message = error_message(body.as_str());
            if status.is_client_error() {
                return Err(AppError::Auth(message));
            }

            return Err(AppError::Internal(format!(
                "sign-in request failed with status {status}: {message}"
            )));
        }

        let token = response.json::<TokenResponse>().await.map_err(|error| {
            AppError::Internal(format!("failed to decode sign-in response: {error}"))
        })?;
        let session = token.into_session(Utc::now());

        *self.session.write().await = Some(session.clone());
        info!(user_id = %session.user_id(), "backend session established");
        self.publish(AuthStateChangeKind::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AppResult<Option<AuthSession>> {
        let role = request.role().to_string();
        let response = self
            .http_client
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", self.config.anon_key())
            .json(&SignUpBody {
                email: request.credentials().email(),
                password: request.credentials().password(),
                data: SignUpMetadata {
                    full_name: request.full_name(),
                    role: role.as_str(),
                },
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("sign-up request transport error: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            let message = error_message(body.as_str());
            if status.is_client_error() {
                return Err(AppError::Auth(message));
            }

            return Err(AppError::Internal(format!(
                "sign-up request failed with status {status}: {message}"
            )));
        }

        let answer = response.json::<SignUpResponse>().await.map_err(|error| {
            AppError::Internal(format!("failed to decode sign-up response: {error}"))
        })?;

        match answer {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now());
                *self.session.write().await = Some(session.clone());
                info!(user_id = %session.user_id(), role = %role, "backend account registered");
                self.publish(AuthStateChangeKind::SignedIn, Some(session.clone()));
                Ok(Some(session))
            }
            SignUpResponse::PendingConfirmation(user) => {
                info!(user_id = %user.id, role = %role, "backend account awaiting confirmation");
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> AppResult<()> {
        let Some(session) = self.session.read().await.clone() else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", self.config.anon_key())
            .bearer_auth(session.access_token())
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("sign-out request transport error: {error}"))
            })?;

        let status = response.status();
        // An already revoked token still ends the local session.
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            return Err(AppError::Auth(error_message(body.as_str())));
        }

        *self.session.write().await = None;
        info!(user_id = %session.user_id(), "backend session ended");
        self.publish(AuthStateChangeKind::SignedOut, None);

        Ok(())
    }
}
