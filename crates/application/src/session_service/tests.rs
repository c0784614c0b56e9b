use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tinspace_core::{
    AppError, AppResult, AuthSession, AuthStateChange, AuthStateChangeKind, PasswordCredentials,
    UserId,
};
use tinspace_domain::{Capability, Identity, Role, RoleRegistry};
use tokio::sync::{Mutex, broadcast};

use super::{AuthBackend, IdentityListener, ProfileRecord, SessionService, SignUpRequest};

type ProfileResponse = AppResult<Option<ProfileRecord>>;

struct FakeAuthBackend {
    user_id: UserId,
    password: String,
    session: Mutex<Option<AuthSession>>,
    profile: Mutex<ProfileResponse>,
    scripted: Mutex<VecDeque<(Duration, ProfileResponse)>>,
    confirm_sign_ups: Mutex<bool>,
    sign_ups: Mutex<Vec<SignUpRequest>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl FakeAuthBackend {
    fn new() -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            user_id: UserId::new(),
            password: "correct-horse".to_owned(),
            session: Mutex::new(None),
            profile: Mutex::new(Ok(None)),
            scripted: Mutex::new(VecDeque::new()),
            confirm_sign_ups: Mutex::new(false),
            sign_ups: Mutex::new(Vec::new()),
            events,
        }
    }

    fn session(&self) -> AuthSession {
        AuthSession::new(
            self.user_id,
            Some("awa.diallo@tinspace.io".to_owned()),
            "access-token",
            None,
            None,
        )
    }

    async fn sign_in_as(&self, role: &str) {
        *self.session.lock().await = Some(self.session());
        self.set_role(role).await;
    }

    async fn set_role(&self, role: &str) {
        *self.profile.lock().await = Ok(Some(profile(role)));
    }

    async fn set_profile(&self, response: ProfileResponse) {
        *self.profile.lock().await = response;
    }

    async fn script(&self, delay: Duration, response: ProfileResponse) {
        self.scripted.lock().await.push_back((delay, response));
    }
}

fn profile(role: &str) -> ProfileRecord {
    ProfileRecord {
        full_name: Some("Awa Diallo".to_owned()),
        role: Some(role.to_owned()),
        avatar_url: None,
        capabilities: None,
    }
}

#[async_trait]
impl AuthBackend for FakeAuthBackend {
    async fn current_session(&self) -> AppResult<Option<AuthSession>> {
        Ok(self.session.lock().await.clone())
    }

    async fn fetch_profile(&self, _session: &AuthSession) -> AppResult<Option<ProfileRecord>> {
        let scripted = self.scripted.lock().await.pop_front();
        if let Some((delay, response)) = scripted {
            tokio::time::sleep(delay).await;
            return response;
        }

        self.profile.lock().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> AppResult<AuthSession> {
        if credentials.password() != self.password {
            return Err(AppError::Auth("Invalid login credentials".to_owned()));
        }

        let session = self.session();
        *self.session.lock().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AppResult<Option<AuthSession>> {
        self.sign_ups.lock().await.push(request.clone());
        if *self.confirm_sign_ups.lock().await {
            return Ok(None);
        }

        *self.profile.lock().await = Ok(Some(ProfileRecord {
            full_name: request.full_name().map(str::to_owned),
            role: Some(request.role().to_string()),
            avatar_url: None,
            capabilities: None,
        }));
        let session = self.session();
        *self.session.lock().await = Some(session.clone());
        Ok(Some(session))
    }

    async fn sign_out(&self) -> AppResult<()> {
        *self.session.lock().await = None;
        Ok(())
    }
}

struct RecordingListener {
    name: &'static str,
    log: Arc<StdMutex<Vec<(&'static str, Identity)>>>,
    fail: bool,
}

impl IdentityListener for RecordingListener {
    fn on_identity_change(&self, identity: &Identity) -> AppResult<()> {
        if let Ok(mut log) = self.log.lock() {
            log.push((self.name, identity.clone()));
        }

        if self.fail {
            return Err(AppError::Internal("listener exploded".to_owned()));
        }

        Ok(())
    }
}

fn service(backend: &Arc<FakeAuthBackend>) -> SessionService {
    SessionService::new(backend.clone(), Arc::new(RoleRegistry::standard()))
}

fn recorded(log: &Arc<StdMutex<Vec<(&'static str, Identity)>>>) -> Vec<(&'static str, Identity)> {
    log.lock().map(|log| log.clone()).unwrap_or_default()
}

#[tokio::test]
async fn starts_anonymous_and_stays_anonymous_without_session() {
    let backend = Arc::new(FakeAuthBackend::new());
    let service = service(&backend);

    assert_eq!(service.current_identity(), Identity::Anonymous);
    assert_eq!(service.refresh_identity().await, Ok(Identity::Anonymous));
    assert_eq!(service.current_identity(), Identity::Anonymous);
}

#[tokio::test]
async fn refresh_resolves_role_capabilities() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("manager").await;
    let service = service(&backend);

    let identity = service.refresh_identity().await;
    let Ok(identity) = identity else {
        panic!("refresh should succeed");
    };

    assert_eq!(identity.role(), Some(&Role::Manager));
    assert_eq!(identity.display_name(), "Awa Diallo");
    assert!(identity.capabilities().contains(&Capability::ManageTeam));
    assert_eq!(service.current_identity(), identity);
}

#[tokio::test]
async fn stored_capability_list_overrides_defaults_without_escalation() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("commercial").await;
    backend
        .set_profile(Ok(Some(ProfileRecord {
            capabilities: Some(vec![Capability::ExportData, Capability::AllAccess]),
            ..profile("commercial")
        })))
        .await;
    let service = service(&backend);

    let identity = service.refresh_identity().await.unwrap_or_default();

    assert_eq!(
        identity.capabilities().iter().cloned().collect::<Vec<_>>(),
        vec![Capability::ExportData]
    );
}

#[tokio::test]
async fn missing_profile_degrades_cached_admin_to_anonymous() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("admin").await;
    let service = service(&backend);
    let admin = service.refresh_identity().await.unwrap_or_default();
    assert!(admin.capabilities().contains(&Capability::AllAccess));

    backend.set_profile(Ok(None)).await;
    let result = service.refresh_identity().await;

    assert!(matches!(result, Err(AppError::ProfileUnavailable(_))));
    assert_eq!(service.current_identity(), Identity::Anonymous);
    assert!(service.current_identity().capabilities().is_empty());
}

#[tokio::test]
async fn blank_role_or_backend_failure_is_profile_unavailable() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("   ").await;
    let service = service(&backend);

    assert!(matches!(
        service.refresh_identity().await,
        Err(AppError::ProfileUnavailable(_))
    ));

    backend
        .set_profile(Err(AppError::Internal("connection reset".to_owned())))
        .await;
    assert!(matches!(
        service.refresh_identity().await,
        Err(AppError::ProfileUnavailable(_))
    ));
    assert_eq!(service.current_identity(), Identity::Anonymous);
}

#[tokio::test]
async fn unknown_role_resolves_with_no_capabilities() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("marketing").await;
    let service = service(&backend);

    let identity = service.refresh_identity().await.unwrap_or_default();

    assert!(!identity.is_anonymous());
    assert_eq!(identity.role().map(Role::as_str), Some("marketing"));
    assert!(identity.capabilities().is_empty());
}

#[tokio::test]
async fn role_change_notifies_listeners_once_in_order() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("commercial").await;
    let service = service(&backend);
    let _ = service.refresh_identity().await;

    let log = Arc::new(StdMutex::new(Vec::new()));
    service.on_identity_change(Arc::new(RecordingListener {
        name: "first",
        log: log.clone(),
        fail: false,
    }));
    service.on_identity_change(Arc::new(RecordingListener {
        name: "second",
        log: log.clone(),
        fail: false,
    }));

    backend.set_role("admin").await;
    let admin = service.refresh_identity().await.unwrap_or_default();

    let entries = recorded(&log);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], ("first", admin.clone()));
    assert_eq!(entries[1], ("second", admin.clone()));
    assert_eq!(
        admin.capabilities().iter().cloned().collect::<Vec<_>>(),
        vec![Capability::AllAccess]
    );
}

#[tokio::test]
async fn unchanged_identity_does_not_notify() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("support").await;
    let service = service(&backend);
    let _ = service.refresh_identity().await;

    let log = Arc::new(StdMutex::new(Vec::new()));
    service.on_identity_change(Arc::new(RecordingListener {
        name: "only",
        log: log.clone(),
        fail: false,
    }));
    let _ = service.refresh_identity().await;

    assert!(recorded(&log).is_empty());
}

#[tokio::test]
async fn failing_listener_does_not_stop_later_listeners() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("partenaire").await;
    let service = service(&backend);

    let log = Arc::new(StdMutex::new(Vec::new()));
    service.on_identity_change(Arc::new(RecordingListener {
        name: "failing",
        log: log.clone(),
        fail: true,
    }));
    service.on_identity_change(Arc::new(RecordingListener {
        name: "healthy",
        log: log.clone(),
        fail: false,
    }));

    assert!(service.refresh_identity().await.is_ok());

    let names: Vec<&str> = recorded(&log).into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["failing", "healthy"]);
}

#[tokio::test]
async fn removed_listener_is_not_called_and_removal_is_idempotent() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("billetterie").await;
    let service = service(&backend);

    let log = Arc::new(StdMutex::new(Vec::new()));
    let id = service.on_identity_change(Arc::new(RecordingListener {
        name: "removed",
        log: log.clone(),
        fail: false,
    }));

    assert!(service.remove_listener(id));
    assert!(!service.remove_listener(id));
    let _ = service.refresh_identity().await;

    assert!(recorded(&log).is_empty());
}

#[tokio::test]
async fn closures_can_listen() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("prospecteur").await;
    let service = service(&backend);

    let seen = Arc::new(StdMutex::new(Vec::new()));
    let sink = seen.clone();
    service.on_identity_change(Arc::new(move |identity: &Identity| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(identity.role().cloned());
        }
        Ok::<(), AppError>(())
    }));

    let _ = service.refresh_identity().await;

    let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
    assert_eq!(seen, vec![Some(Role::Prospecteur)]);
}

#[tokio::test]
async fn superseded_refresh_never_overwrites_newer_result() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("commercial").await;
    backend
        .script(Duration::from_millis(80), Ok(Some(profile("manager"))))
        .await;
    backend
        .script(Duration::from_millis(5), Ok(Some(profile("admin"))))
        .await;
    let service = service(&backend);

    let (older, newer) = tokio::join!(service.refresh_identity(), service.refresh_identity());

    assert_eq!(
        older.ok().and_then(|identity| identity.role().cloned()),
        Some(Role::Manager)
    );
    assert_eq!(
        newer.ok().and_then(|identity| identity.role().cloned()),
        Some(Role::Admin)
    );
    assert_eq!(service.current_identity().role(), Some(&Role::Admin));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listeners_see_concurrent_refreshes_in_apply_order() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("commercial").await;
    backend
        .script(Duration::ZERO, Ok(Some(profile("manager"))))
        .await;
    backend
        .script(Duration::from_millis(30), Ok(Some(profile("admin"))))
        .await;
    let service = service(&backend);

    let seen = Arc::new(StdMutex::new(Vec::new()));
    let sink = seen.clone();
    service.on_identity_change(Arc::new(move |identity: &Identity| {
        // A slow listener on the first applied identity.
        if identity.role() == Some(&Role::Manager) {
            std::thread::sleep(Duration::from_millis(150));
        }
        if let Ok(mut seen) = sink.lock() {
            seen.push(identity.role().cloned());
        }
        Ok::<(), AppError>(())
    }));

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.refresh_identity().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = service.refresh_identity().await;
    let first = first.await;

    assert!(matches!(first, Ok(Ok(_))));
    assert!(second.is_ok());
    let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
    assert_eq!(seen, vec![Some(Role::Manager), Some(Role::Admin)]);
    assert_eq!(service.current_identity().role(), Some(&Role::Admin));
}

#[tokio::test]
async fn timeout_leaves_cached_identity_untouched() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("manager").await;
    let service = service(&backend);
    let cached = service.refresh_identity().await.unwrap_or_default();

    backend
        .script(Duration::from_millis(200), Ok(Some(profile("admin"))))
        .await;
    let result = service
        .refresh_identity_with_timeout(Duration::from_millis(10))
        .await;

    assert!(matches!(result, Err(AppError::Timeout(_))));
    assert_eq!(service.current_identity(), cached);
}

#[tokio::test]
async fn dropped_refresh_leaves_cached_identity_untouched() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("manager").await;
    let service = service(&backend);
    let cached = service.refresh_identity().await.unwrap_or_default();

    backend
        .script(Duration::from_millis(200), Ok(Some(profile("admin"))))
        .await;
    let cancelled =
        tokio::time::timeout(Duration::from_millis(10), service.refresh_identity()).await;

    assert!(cancelled.is_err());
    assert_eq!(service.current_identity(), cached);
}

#[tokio::test]
async fn sign_in_failure_is_propagated_verbatim() {
    let backend = Arc::new(FakeAuthBackend::new());
    let service = service(&backend);
    let credentials = PasswordCredentials::new("awa.diallo@tinspace.io", "wrong");
    let Ok(credentials) = credentials else {
        panic!("credentials should be valid");
    };

    assert_eq!(
        service.sign_in(&credentials).await,
        Err(AppError::Auth("Invalid login credentials".to_owned()))
    );
    assert_eq!(service.current_identity(), Identity::Anonymous);
}

#[tokio::test]
async fn sign_in_then_sign_out_round_trip() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.set_role("commercial").await;
    let service = service(&backend);
    let credentials = PasswordCredentials::new("awa.diallo@tinspace.io", "correct-horse");
    let Ok(credentials) = credentials else {
        panic!("credentials should be valid");
    };

    let identity = service.sign_in(&credentials).await.unwrap_or_default();
    assert_eq!(identity.role(), Some(&Role::Commercial));

    assert!(service.sign_out().await.is_ok());
    assert_eq!(service.current_identity(), Identity::Anonymous);
}

fn sign_up_request() -> SignUpRequest {
    let Ok(credentials) = PasswordCredentials::new("ndeye@tinspace.io", "correct-horse") else {
        panic!("credentials should be valid");
    };
    SignUpRequest::new(credentials).with_full_name("Ndeye Sow")
}

#[tokio::test]
async fn sign_up_defaults_to_prospecteur_and_signs_in() {
    let backend = Arc::new(FakeAuthBackend::new());
    let service = service(&backend);

    let identity = service.sign_up(&sign_up_request()).await;
    let Ok(identity) = identity else {
        panic!("sign-up should succeed");
    };

    assert_eq!(identity.role(), Some(&Role::Prospecteur));
    assert_eq!(identity.display_name(), "Ndeye Sow");
    assert!(
        identity
            .capabilities()
            .contains(&Capability::ViewProspectorDashboard)
    );
    assert_eq!(service.current_identity(), identity);
}

#[tokio::test]
async fn sign_up_cannot_request_admin() {
    let backend = Arc::new(FakeAuthBackend::new());
    let service = service(&backend);

    let result = service
        .sign_up(&sign_up_request().with_role(Role::Admin))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(backend.sign_ups.lock().await.is_empty());
    assert_eq!(service.current_identity(), Identity::Anonymous);
}

#[tokio::test]
async fn sign_up_awaiting_confirmation_stays_anonymous() {
    let backend = Arc::new(FakeAuthBackend::new());
    *backend.confirm_sign_ups.lock().await = true;
    let service = service(&backend);

    let result = service
        .sign_up(&sign_up_request().with_role(Role::Partenaire))
        .await;

    assert_eq!(result, Ok(Identity::Anonymous));
    let requested: Vec<Role> = backend
        .sign_ups
        .lock()
        .await
        .iter()
        .map(|request| request.role().clone())
        .collect();
    assert_eq!(requested, vec![Role::Partenaire]);
}

#[tokio::test]
async fn pushed_sign_out_resets_identity() {
    let backend = Arc::new(FakeAuthBackend::new());
    backend.sign_in_as("manager").await;
    let service = service(&backend);
    let _ = service.refresh_identity().await;

    let change = AuthStateChange {
        kind: AuthStateChangeKind::SignedOut,
        session: None,
    };
    assert_eq!(
        service.handle_auth_state_change(&change).await,
        Ok(Identity::Anonymous)
    );
    assert_eq!(service.current_identity(), Identity::Anonymous);
}

#[tokio::test]
async fn spawned_listener_applies_pushed_changes() {
    let backend = Arc::new(FakeAuthBackend::new());
    let service = service(&backend);
    let handle = service.spawn_auth_state_listener();

    backend.sign_in_as("support").await;
    let _ = backend.events.send(AuthStateChange {
        kind: AuthStateChangeKind::SignedIn,
        session: Some(backend.session()),
    });

    let mut resolved = false;
    for _ in 0..50 {
        if service.current_identity().role() == Some(&Role::Support) {
            resolved = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    handle.abort();
    assert!(resolved);
}
