use tinspace_application::TeamDirectory;
use tinspace_core::UserId;
use tinspace_domain::{TeamMember, TeamMemberChanges, TeamMemberInput};

use super::wire::{AdminUser, AdminUserCreate, AdminUserPage, AdminUserUpdate, UserMetadata};
use super::*;

const ADMIN_PAGE_SIZE: usize = 200;

impl SupabaseAuthBackend {
    fn service_role_key(&self) -> AppResult<&str> {
        self.config.service_role_key().ok_or_else(|| {
            AppError::Validation(
                "TINSPACE_BAAS_SERVICE_ROLE_KEY is required for team administration".to_owned(),
            )
        })
    }

    fn admin_request(
        &self,
        method: reqwest::Method,
        url: Url,
    ) -> AppResult<reqwest::RequestBuilder> {
        let key = self.service_role_key()?;
        Ok(self
            .http_client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key))
    }

    async fn fetch_admin_user(&self, user_id: UserId) -> AppResult<Option<AdminUser>> {
        let url = self.endpoint(format!("auth/v1/admin/users/{user_id}").as_str())?;
        let response = self
            .admin_request(reqwest::Method::GET, url)?
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("admin user request transport error: {error}"))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "admin user request").await?;
        let user = response.json::<AdminUser>().await.map_err(|error| {
            AppError::Internal(format!("failed to decode admin user response: {error}"))
        })?;

        Ok(Some(user))
    }
}

#[async_trait]
impl TeamDirectory for SupabaseAuthBackend {
    async fn list_members(&self) -> AppResult<Vec<TeamMember>> {
        let mut members = Vec::new();
        let mut page = 1_usize;

        loop {
            let mut url = self.endpoint("auth/v1/admin/users")?;
            url.query_pairs_mut()
                .append_pair("page", page.to_string().as_str())
                .append_pair("per_page", ADMIN_PAGE_SIZE.to_string().as_str());

            let response = self
                .admin_request(reqwest::Method::GET, url)?
                .send()
                .await
                .map_err(|error| {
                    AppError::Internal(format!("admin user list transport error: {error}"))
                })?;
            let response = ensure_success(response, "admin user list").await?;
            let batch = response.json::<AdminUserPage>().await.map_err(|error| {
                AppError::Internal(format!("failed to decode admin user list: {error}"))
            })?;

            let received = batch.users.len();
            for user in batch.users {
                let user_id = user.id;
                match user.into_member() {
                    Ok(member) => members.push(member),
                    Err(error) => {
                        warn!(user_id = %user_id, error = %error, "skipping invalid team member");
                    }
                }
            }

            if received < ADMIN_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!(count = members.len(), "team directory listed");
        Ok(members)
    }

    async fn find_member(&self, user_id: UserId) -> AppResult<Option<TeamMember>> {
        self.fetch_admin_user(user_id)
            .await?
            .map(AdminUser::into_member)
            .transpose()
    }

    async fn create_member(
        &self,
        credentials: &PasswordCredentials,
        profile: &TeamMemberChanges,
    ) -> AppResult<TeamMember> {
        // Validates the profile and fills in defaults before anything is sent.
        let draft = TeamMember::new(TeamMemberInput::from_changes(
            UserId::new(),
            credentials.email(),
            profile,
        ))?;

        let url = self.endpoint("auth/v1/admin/users")?;
        let response = self
            .admin_request(reqwest::Method::POST, url)?
            .json(&AdminUserCreate {
                email: credentials.email(),
                password: credentials.password(),
                email_confirm: true,
                user_metadata: UserMetadata::from(&draft),
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("admin user create transport error: {error}"))
            })?;

        // GoTrue answers 422 when the address is already registered.
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            return Err(AppError::Conflict(super::error_message(body.as_str())));
        }

        let response = ensure_success(response, "admin user create").await?;
        let user = response.json::<AdminUser>().await.map_err(|error| {
            AppError::Internal(format!("failed to decode created admin user: {error}"))
        })?;

        user.into_member()
    }

    async fn update_member(
        &self,
        user_id: UserId,
        changes: &TeamMemberChanges,
    ) -> AppResult<TeamMember> {
        let current = self
            .find_member(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))?;
        let updated = current.with_changes(changes)?;

        let url = self.endpoint(format!("auth/v1/admin/users/{user_id}").as_str())?;
        let response = self
            .admin_request(reqwest::Method::PUT, url)?
            .json(&AdminUserUpdate {
                user_metadata: UserMetadata::from(&updated),
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("admin user update transport error: {error}"))
            })?;
        let response = ensure_success(response, "admin user update").await?;
        let user = response.json::<AdminUser>().await.map_err(|error| {
            AppError::Internal(format!("failed to decode admin user update: {error}"))
        })?;

        user.into_member()
    }

    async fn remove_member(&self, user_id: UserId) -> AppResult<()> {
        let url = self.endpoint(format!("auth/v1/admin/users/{user_id}").as_str())?;
        let response = self
            .admin_request(reqwest::Method::DELETE, url)?
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("admin user delete transport error: {error}"))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("user '{user_id}' does not exist")));
        }

        ensure_success(response, "admin user delete").await?;
        Ok(())
    }
}

async fn ensure_success(
    response: reqwest::Response,
    context: &str,
) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
    let message = super::error_message(body.as_str());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AppError::Forbidden(format!(
            "{context} rejected with status {status}: {message}"
        )));
    }

    Err(AppError::Internal(format!(
        "{context} failed with status {status}: {message}"
    )))
}
