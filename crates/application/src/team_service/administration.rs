use tinspace_domain::{validate_commission_rate, validate_points};

use super::*;

impl TeamService {
    /// Creates an account with its team profile.
    ///
    /// Missing profile fields take the member defaults. Capabilities are
    /// normalized the same way as in [`TeamService::update_member`].
    pub async fn create_member(
        &self,
        identity: &Identity,
        credentials: PasswordCredentials,
        profile: TeamMemberChanges,
    ) -> AppResult<TeamMember> {
        let actor = require_capability(identity, &Capability::ManageUsers)?;
        validate_changes(&profile)?;

        let role = profile.role.clone().unwrap_or(Role::Commercial);
        let capabilities = self.normalize_capabilities(&role, profile.capabilities, None);
        let profile = TeamMemberChanges {
            role: Some(role),
            capabilities,
            ..profile
        };

        let created = self
            .directory
            .create_member(&credentials, &profile)
            .await?;

        info!(
            actor = %actor,
            user_id = %created.id(),
            role = %created.role(),
            "team member created"
        );

        Ok(created)
    }

    /// Applies administrative changes to a member.
    ///
    /// The `admin` role always stores the wildcard as its capability list and
    /// the wildcard is stripped from every other role. When the target is
    /// the signed-in account, the session is refreshed afterwards.
    pub async fn update_member(
        &self,
        identity: &Identity,
        user_id: UserId,
        changes: TeamMemberChanges,
    ) -> AppResult<TeamMember> {
        let actor = require_capability(identity, &Capability::ManageUsers)?;
        validate_changes(&changes)?;

        let current = self
            .directory
            .find_member(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("team member '{user_id}' does not exist")))?;

        let role = changes
            .role
            .clone()
            .unwrap_or_else(|| current.role().clone());
        let capabilities =
            self.normalize_capabilities(&role, changes.capabilities, current.capabilities());
        let changes = TeamMemberChanges {
            capabilities,
            ..changes
        };
        let updated = self.directory.update_member(user_id, &changes).await?;

        info!(
            actor = %actor,
            user_id = %user_id,
            role = %updated.role(),
            "team member updated"
        );

        if identity.user_id() == Some(user_id)
            && let Err(error) = self.session.refresh_identity().await
        {
            warn!(user_id = %user_id, error = %error, "session refresh after self update failed");
        }

        Ok(updated)
    }

    /// Deletes a member. Administrators cannot be removed.
    pub async fn remove_member(&self, identity: &Identity, user_id: UserId) -> AppResult<()> {
        let actor = require_capability(identity, &Capability::ManageUsers)?;

        let target = self
            .directory
            .find_member(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("team member '{user_id}' does not exist")))?;

        if target.role().is_admin() {
            return Err(AppError::Forbidden(format!(
                "administrator '{user_id}' cannot be removed"
            )));
        }

        self.directory.remove_member(user_id).await?;
        info!(actor = %actor, user_id = %user_id, "team member removed");

        Ok(())
    }

    /// The `admin` role always stores the wildcard. Other roles never do: a
    /// requested list is stripped of it and a stored wildcard list falls
    /// back to the role's defaults.
    fn normalize_capabilities(
        &self,
        role: &Role,
        requested: Option<Vec<Capability>>,
        stored: Option<&[Capability]>,
    ) -> Option<Vec<Capability>> {
        if role.is_admin() {
            return Some(vec![Capability::AllAccess]);
        }

        let requested = requested.or_else(|| {
            stored
                .filter(|stored| stored.contains(&Capability::AllAccess))
                .map(|_| {
                    self.session
                        .registry()
                        .capabilities_for(role)
                        .iter()
                        .cloned()
                        .collect()
                })
        });

        requested.map(|capabilities| {
            capabilities
                .into_iter()
                .filter(|capability| !capability.is_wildcard())
                .collect()
        })
    }
}

fn validate_changes(changes: &TeamMemberChanges) -> AppResult<()> {
    if let Some(points) = changes.points {
        validate_points(points)?;
    }
    if let Some(commission_rate) = changes.commission_rate {
        validate_commission_rate(commission_rate)?;
    }

    Ok(())
}
