//! Team directory service.
//!
//! Lists team members with their commission estimates and performs the
//! account creation and profile changes of the user management console.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use tinspace_core::{AppError, AppResult, PasswordCredentials, UserId};
use tinspace_domain::{
    Capability, CommissionEstimate, Identity, Role, TeamFilter, TeamMember, TeamMemberChanges,
    can_access_capability,
};

use crate::SessionService;

mod administration;


// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Repository port over the account directory.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Lists every account as a team member.
    async fn list_members(&self) -> AppResult<Vec<TeamMember>>;

    /// Finds one account.
    async fn find_member(&self, user_id: UserId) -> AppResult<Option<TeamMember>>;

    /// Creates an account whose metadata is the already normalized
    /// `profile`. Duplicate e-mails are `AppError::Conflict`.
    async fn create_member(
        &self,
        credentials: &PasswordCredentials,
        profile: &TeamMemberChanges,
    ) -> AppResult<TeamMember>;

    /// Stores already normalized changes and returns the updated member.
    async fn update_member(
        &self,
        user_id: UserId,
        changes: &TeamMemberChanges,
    ) -> AppResult<TeamMember>;

    /// Deletes an account.
    async fn remove_member(&self, user_id: UserId) -> AppResult<()>;
}

// ---------------------------------------------------------------------------
// Read model
// ---------------------------------------------------------------------------

/// Team member row with its presentation fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMemberSummary {
    /// The member.
    pub member: TeamMember,
    /// Display label of the member's role.
    pub role_label: String,
    /// Commission earned on the current point total.
    pub commission: CommissionEstimate,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for the team directory.
#[derive(Clone)]
pub struct TeamService {
    directory: Arc<dyn TeamDirectory>,
    session: SessionService,
}

impl TeamService {
    /// Creates a team service.
    #[must_use]
    pub fn new(directory: Arc<dyn TeamDirectory>, session: SessionService) -> Self {
        Self {
            directory,
            session,
        }
    }

    /// Lists the team visible to `identity`.
    ///
    /// Identities allowed to manage the team see every member matching the
    /// filter. Everyone else only sees their own entry.
    pub async fn list_team(
        &self,
        identity: &Identity,
        filter: &TeamFilter,
    ) -> AppResult<Vec<TeamMemberSummary>> {
        let user_id = require_authenticated(identity)?;
        let sees_everyone = can_access_capability(identity, &Capability::ManageTeam);

        let members = self.directory.list_members().await?;
        members
            .into_iter()
            .filter(|member| {
                if sees_everyone {
                    filter.matches(member)
                } else {
                    member.id() == user_id
                }
            })
            .map(|member| self.summarize(member))
            .collect()
    }

    fn summarize(&self, member: TeamMember) -> AppResult<TeamMemberSummary> {
        let commission = member.estimated_commission()?;
        let role_label = self
            .session
            .registry()
            .label_for(member.role())
            .to_owned();

        Ok(TeamMemberSummary {
            member,
            role_label,
            commission,
        })
    }
}

fn require_authenticated(identity: &Identity) -> AppResult<UserId> {
    identity.user_id().ok_or_else(|| {
        AppError::Unauthenticated("a signed-in account is required".to_owned())
    })
}

fn require_capability(identity: &Identity, capability: &Capability) -> AppResult<UserId> {
    let user_id = require_authenticated(identity)?;
    if !can_access_capability(identity, capability) {
        return Err(AppError::Forbidden(format!(
            "user '{user_id}' lacks capability '{capability}'"
        )));
    }

    Ok(user_id)
}
