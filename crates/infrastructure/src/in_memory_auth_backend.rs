use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tinspace_application::{AuthBackend, ProfileRecord, SignUpRequest, TeamDirectory};
use tinspace_core::{
    AppError, AppResult, AuthSession, AuthStateChange, AuthStateChangeKind, PasswordCredentials,
    UserId,
};
use tinspace_domain::{Capability, Role, TeamMember, TeamMemberChanges, TeamMemberInput};
use tokio::sync::{RwLock, broadcast};
use tracing::info;
use uuid::Uuid;

/// Password of every account seeded by [`InMemoryAuthBackend::with_demo_data`].
pub const DEMO_PASSWORD: &str = "tinspace-demo";

const SESSION_LIFETIME_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
struct InMemoryAccount {
    password: String,
    member: TeamMember,
    avatar_url: Option<String>,
}

/// In-process adapter for the authentication and team directory ports.
pub struct InMemoryAuthBackend {
    accounts: RwLock<HashMap<UserId, InMemoryAccount>>,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl Default for InMemoryAuthBackend {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            events,
        }
    }
}

impl InMemoryAuthBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend seeded with one account per standard role, all
    /// sharing [`DEMO_PASSWORD`]. E-mails are `<role>@tinspace.demo`.
    pub fn with_demo_data() -> AppResult<Self> {
        let seed = [
            ("Khady Ndiaye", Role::Admin, 0, 0.0),
            ("Lamine Sarr", Role::Manager, 310, 0.05),
            ("Awa Diallo", Role::Commercial, 120, 0.03),
            ("Ousmane Fall", Role::Prospecteur, 75, 0.04),
            ("Aminata Sy", Role::Partenaire, 40, 0.02),
            ("Babacar Gueye", Role::Billetterie, 95, 0.03),
            ("Fatou Kane", Role::Support, 10, 0.01),
        ];

        let mut accounts = HashMap::new();
        for (name, role, points, commission_rate) in seed {
            let member = TeamMember::new(TeamMemberInput {
                id: UserId::new(),
                email: format!("{}@tinspace.demo", role.as_str()),
                full_name: Some(name.to_owned()),
                capabilities: role.is_admin().then(|| vec![Capability::AllAccess]),
                role: Some(role),
                points: Some(points),
                commission_rate: Some(commission_rate),
            })?;
            accounts.insert(
                member.id(),
                InMemoryAccount {
                    password: DEMO_PASSWORD.to_owned(),
                    member,
                    avatar_url: None,
                },
            );
        }

        let backend = Self::new();
        Ok(Self {
            accounts: RwLock::new(accounts),
            ..backend
        })
    }

    /// Adds an account, rejecting duplicate e-mails.
    pub async fn add_account(
        &self,
        member: TeamMember,
        password: impl Into<String>,
    ) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|account| account.member.email().eq_ignore_ascii_case(member.email()))
        {
            return Err(AppError::Conflict(format!(
                "an account already uses '{}'",
                member.email()
            )));
        }

        accounts.insert(
            member.id(),
            InMemoryAccount {
                password: password.into(),
                member,
                avatar_url: None,
            },
        );
        Ok(())
    }

    async fn open_session(&self, member: &TeamMember) -> AuthSession {
        let session = AuthSession::new(
            member.id(),
            Some(member.email().to_owned()),
            format!("memory-{}", Uuid::new_v4()),
            None,
            Some(Utc::now() + Duration::minutes(SESSION_LIFETIME_MINUTES)),
        );

        *self.session.write().await = Some(session.clone());
        info!(user_id = %member.id(), "in-memory session established");
        self.publish(AuthStateChangeKind::SignedIn, Some(session.clone()));
        session
    }

    fn publish(&self, kind: AuthStateChangeKind, session: Option<AuthSession>) {
        let _ = self.events.send(AuthStateChange { kind, session });
    }
}

#[async_trait]
impl AuthBackend for InMemoryAuthBackend {
    async fn current_session(&self) -> AppResult<Option<AuthSession>> {
        Ok(self.session.read().await.clone())
    }

    async fn fetch_profile(&self, session: &AuthSession) -> AppResult<Option<ProfileRecord>> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&session.user_id())
            .map(|account| ProfileRecord {
                full_name: Some(account.member.display_name().to_owned()),
                role: Some(account.member.role().to_string()),
                avatar_url: account.avatar_url.clone(),
                capabilities: account.member.capabilities().map(<[Capability]>::to_vec),
            }))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> AppResult<AuthSession> {
        let member = self
            .accounts
            .read()
            .await
            .values()
            .find(|account| {
                account.member.email().eq_ignore_ascii_case(credentials.email())
                    && account.password == credentials.password()
            })
            .map(|account| account.member.clone())
            .ok_or_else(|| AppError::Auth("Invalid login credentials".to_owned()))?;

        Ok(self.open_session(&member).await)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AppResult<Option<AuthSession>> {
        let member = TeamMember::new(TeamMemberInput {
            id: UserId::new(),
            email: request.credentials().email().to_owned(),
            full_name: request.full_name().map(str::to_owned),
            role: Some(request.role().clone()),
            points: None,
            commission_rate: None,
            capabilities: None,
        })?;
        self.add_account(member.clone(), request.credentials().password())
            .await
            .map_err(|error| match error {
                AppError::Conflict(_) => AppError::Auth("User already registered".to_owned()),
                other => other,
            })?;

        Ok(Some(self.open_session(&member).await))
    }

    async fn sign_out(&self) -> AppResult<()> {
        if self.session.write().await.take().is_some() {
            self.publish(AuthStateChangeKind::SignedOut, None);
        }

        Ok(())
    }
}

#[async_trait]
impl TeamDirectory for InMemoryAuthBackend {
    async fn create_member(
        &self,
        credentials: &PasswordCredentials,
        profile: &TeamMemberChanges,
    ) -> AppResult<TeamMember> {
        let member = TeamMember::new(TeamMemberInput::from_changes(
            UserId::new(),
            credentials.email(),
            profile,
        ))?;
        self.add_account(member.clone(), credentials.password())
            .await?;
        info!(user_id = %member.id(), role = %member.role(), "in-memory account created");

        Ok(member)
    }

    async fn list_members(&self) -> AppResult<Vec<TeamMember>> {
        let mut members: Vec<TeamMember> = self
            .accounts
            .read()
            .await
            .values()
            .map(|account| account.member.clone())
            .collect();
        members.sort_by(|left, right| left.display_name().cmp(right.display_name()));
        Ok(members)
    }

    async fn find_member(&self, user_id: UserId) -> AppResult<Option<TeamMember>> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&user_id)
            .map(|account| account.member.clone()))
    }

    async fn update_member(
        &self,
        user_id: UserId,
        changes: &TeamMemberChanges,
    ) -> AppResult<TeamMember> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))?;

        account.member = account.member.with_changes(changes)?;
        let updated = account.member.clone();
        drop(accounts);

        let session = self.session.read().await.clone();
        if session
            .as_ref()
            .is_some_and(|session| session.user_id() == user_id)
        {
            self.publish(AuthStateChangeKind::UserUpdated, session);
        }

        Ok(updated)
    }

    async fn remove_member(&self, user_id: UserId) -> AppResult<()> {
        self.accounts
            .write()
            .await
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))
    }
}
