use std::str::FromStr;

use super::*;

impl SessionService {
    /// Re-reads the session and profile, resolves capabilities and replaces
    /// the cached identity, within the configured refresh deadline.
    pub async fn refresh_identity(&self) -> AppResult<Identity> {
        self.refresh_identity_with_timeout(self.refresh_timeout)
            .await
    }

    /// Same as [`SessionService::refresh_identity`] with a caller deadline.
    ///
    /// On timeout, or when the returned future is dropped, the cached
    /// identity is left untouched. A refresh overtaken by a later-started
    /// one that already completed returns its result without applying it.
    pub async fn refresh_identity_with_timeout(&self, timeout: Duration) -> AppResult<Identity> {
        let generation = self.start_generation();

        let resolved = match tokio::time::timeout(timeout, self.resolve_identity()).await {
            Ok(resolved) => resolved,
            Err(_) => {
                warn!(
                    generation,
                    timeout_ms = timeout.as_millis(),
                    "identity refresh timed out"
                );
                return Err(AppError::Timeout(format!(
                    "identity refresh exceeded {} ms",
                    timeout.as_millis()
                )));
            }
        };

        match resolved {
            Ok(identity) => {
                if self.apply_identity(generation, &identity) {
                    match &identity {
                        Identity::Authenticated(authenticated) => debug!(
                            generation,
                            user_id = %authenticated.id(),
                            role = %authenticated.role(),
                            "identity refreshed"
                        ),
                        Identity::Anonymous => debug!(generation, "identity refreshed to anonymous"),
                    }
                }
                Ok(identity)
            }
            Err(error) => {
                warn!(generation, error = %error, "identity refresh failed, falling back to anonymous");
                self.apply_identity(generation, &Identity::Anonymous);
                Err(error)
            }
        }
    }

    async fn resolve_identity(&self) -> AppResult<Identity> {
        let Some(session) = self.backend.current_session().await? else {
            return Ok(Identity::Anonymous);
        };

        let profile = self
            .backend
            .fetch_profile(&session)
            .await
            .map_err(|error| {
                AppError::ProfileUnavailable(format!(
                    "profile of user '{}' could not be fetched: {error}",
                    session.user_id()
                ))
            })?
            .ok_or_else(|| {
                AppError::ProfileUnavailable(format!(
                    "user '{}' has no profile",
                    session.user_id()
                ))
            })?;

        let role = profile
            .role
            .as_deref()
            .map(Role::from_str)
            .transpose()
            .ok()
            .flatten()
            .ok_or_else(|| {
                AppError::ProfileUnavailable(format!(
                    "profile of user '{}' carries no role",
                    session.user_id()
                ))
            })?;

        let display_name = display_name(&session, &profile);

        Ok(Identity::resolve(
            self.registry.as_ref(),
            session.user_id(),
            role,
            display_name,
            profile.capabilities.as_deref(),
        ))
    }
}

fn display_name(session: &AuthSession, profile: &ProfileRecord) -> String {
    profile
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            session
                .email()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
        })
        .map(str::to_owned)
        .unwrap_or_else(|| session.user_id().to_string())
}
