//! Session/identity provider.
//!
//! The only component that talks to the authentication backend for
//! identity data. It owns the cached [`Identity`] every access decision is
//! evaluated against, refreshes it on demand or on pushed auth-state
//! changes, and notifies registered listeners when it changes.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tinspace_core::{
    AppError, AppResult, AuthSession, AuthStateChange, AuthStateChangeKind, PasswordCredentials,
};
use tinspace_domain::{Capability, Identity, Role, RoleRegistry};

mod auth_state;
mod listeners;
mod refresh;

#[cfg(test)]
mod tests;

/// Refresh deadline used when the caller does not supply one.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Profile row stored next to the authentication account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileRecord {
    /// Full name, if filled in.
    pub full_name: Option<String>,
    /// Raw role identifier as stored.
    pub role: Option<String>,
    /// Avatar URL, if any.
    pub avatar_url: Option<String>,
    /// Explicit capability list overriding the role defaults.
    pub capabilities: Option<Vec<Capability>>,
}

/// Self-service registration of a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpRequest {
    credentials: PasswordCredentials,
    full_name: Option<String>,
    role: Role,
}

impl SignUpRequest {
    /// Creates a request for the default `prospecteur` role.
    #[must_use]
    pub fn new(credentials: PasswordCredentials) -> Self {
        Self {
            credentials,
            full_name: None,
            role: Role::Prospecteur,
        }
    }

    /// Sets the full name stored on the profile. Blank names are ignored.
    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        let full_name = full_name.into().trim().to_owned();
        self.full_name = (!full_name.is_empty()).then_some(full_name);
        self
    }

    /// Requests another role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Returns the credentials of the new account.
    #[must_use]
    pub fn credentials(&self) -> &PasswordCredentials {
        &self.credentials
    }

    /// Returns the full name, if any.
    #[must_use]
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    /// Returns the requested role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }
}

/// Port for the hosted authentication backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Returns the locally held session, if any. Must not hit the network.
    async fn current_session(&self) -> AppResult<Option<AuthSession>>;

    /// Fetches the profile row of the session's account.
    ///
    /// `Ok(None)` means the row does not exist.
    async fn fetch_profile(&self, session: &AuthSession) -> AppResult<Option<ProfileRecord>>;

    /// Subscribes to pushed session changes.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;

    /// Signs in with e-mail and password. Rejections are `AppError::Auth`.
    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> AppResult<AuthSession>;

    /// Registers an account with its profile metadata.
    ///
    /// Returns the new session when the backend signs the account in right
    /// away, `None` when the address must be confirmed first.
    async fn sign_up(&self, request: &SignUpRequest) -> AppResult<Option<AuthSession>>;

    /// Ends the current session.
    async fn sign_out(&self) -> AppResult<()>;
}

/// Callback notified when the cached identity changes.
pub trait IdentityListener: Send + Sync {
    /// Receives the new identity. Errors are logged and do not stop other
    /// listeners.
    fn on_identity_change(&self, identity: &Identity) -> AppResult<()>;
}

impl<F> IdentityListener for F
where
    F: Fn(&Identity) -> AppResult<()> + Send + Sync,
{
    fn on_identity_change(&self, identity: &Identity) -> AppResult<()> {
        self(identity)
    }
}

/// Handle returned by [`SessionService::on_identity_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl Display for ListenerId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "listener-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

struct CachedIdentity {
    identity: Identity,
    generation: u64,
}

struct SessionState {
    cache: RwLock<CachedIdentity>,
    // Held across a cache write and its notification so listeners observe
    // applied identities in apply order.
    apply_gate: Mutex<()>,
    next_generation: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn IdentityListener>)>>,
    next_listener_id: AtomicU64,
}

/// Application service owning the current identity.
#[derive(Clone)]
pub struct SessionService {
    backend: Arc<dyn AuthBackend>,
    registry: Arc<RoleRegistry>,
    refresh_timeout: Duration,
    state: Arc<SessionState>,
}

impl SessionService {
    /// Creates a session service starting from `Identity::Anonymous`.
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>, registry: Arc<RoleRegistry>) -> Self {
        Self {
            backend,
            registry,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            state: Arc::new(SessionState {
                cache: RwLock::new(CachedIdentity {
                    identity: Identity::Anonymous,
                    generation: 0,
                }),
                apply_gate: Mutex::new(()),
                next_generation: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// Overrides the default refresh deadline.
    #[must_use]
    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// Returns the role registry identities are resolved against.
    #[must_use]
    pub fn registry(&self) -> &RoleRegistry {
        self.registry.as_ref()
    }

    /// Returns the cached identity without touching the backend.
    #[must_use]
    pub fn current_identity(&self) -> Identity {
        self.state
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .identity
            .clone()
    }

    /// Signs in and refreshes the identity.
    ///
    /// Backend rejections are returned unchanged and leave the cache as is.
    pub async fn sign_in(&self, credentials: &PasswordCredentials) -> AppResult<Identity> {
        let session = self.backend.sign_in_with_password(credentials).await?;
        info!(user_id = %session.user_id(), "signed in");
        self.refresh_identity().await
    }

    /// Registers an account and refreshes the identity when the backend
    /// opened a session for it.
    ///
    /// Self-service registration cannot request the `admin` role.
    pub async fn sign_up(&self, request: &SignUpRequest) -> AppResult<Identity> {
        if request.role().is_admin() {
            return Err(AppError::Forbidden(
                "the admin role cannot be requested at sign-up".to_owned(),
            ));
        }

        match self.backend.sign_up(request).await? {
            Some(session) => {
                info!(user_id = %session.user_id(), role = %request.role(), "signed up");
                self.refresh_identity().await
            }
            None => {
                info!(
                    email = %request.credentials().email(),
                    "sign-up awaiting e-mail confirmation"
                );
                Ok(self.current_identity())
            }
        }
    }

    /// Signs out and resets the identity to anonymous.
    pub async fn sign_out(&self) -> AppResult<()> {
        let user_id = self.current_identity().user_id();
        self.backend.sign_out().await?;
        self.clear_identity();
        if let Some(user_id) = user_id {
            info!(user_id = %user_id, "signed out");
        }

        Ok(())
    }

    fn start_generation(&self) -> u64 {
        self.state.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replaces the cache if `generation` is newer than the applied one and
    /// notifies listeners when the identity changed. Returns whether the
    /// identity was applied.
    fn apply_identity(&self, generation: u64, identity: &Identity) -> bool {
        let _gate = self
            .state
            .apply_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous = {
            let mut cache = self
                .state
                .cache
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if generation <= cache.generation {
                debug!(
                    generation,
                    applied_generation = cache.generation,
                    "discarding superseded identity refresh"
                );
                return false;
            }

            cache.generation = generation;
            std::mem::replace(&mut cache.identity, identity.clone())
        };

        if previous != *identity {
            self.notify_listeners(identity);
        }

        true
    }

    fn clear_identity(&self) {
        let generation = self.start_generation();
        self.apply_identity(generation, &Identity::Anonymous);
    }
}
