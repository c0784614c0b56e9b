//! Wire shapes of the auth, REST and admin endpoints.

use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tinspace_application::ProfileRecord;
use tinspace_core::{AppResult, AuthSession, UserId};
use tinspace_domain::{Capability, Role, TeamMember, TeamMemberInput};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub(super) struct PasswordGrantBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct SignUpBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpMetadata<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct SignUpMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<&'a str>,
    pub role: &'a str,
}

/// Sign-up answer: a session when the account is confirmed right away,
/// the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SignUpResponse {
    Session(TokenResponse),
    PendingConfirmation(AdminUser),
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AdminUser,
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
            .or_else(|| {
                self.expires_in
                    .map(|seconds| now + ChronoDuration::seconds(seconds))
            });

        AuthSession::new(
            UserId::from_uuid(self.user.id),
            self.user.email,
            self.access_token,
            self.refresh_token,
            expires_at,
        )
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProfileRow {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

impl From<ProfileRow> for ProfileRecord {
    fn from(row: ProfileRow) -> Self {
        Self {
            full_name: row.full_name,
            role: row.role,
            avatar_url: row.avatar_url,
            capabilities: row.permissions.map(parse_capabilities),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AdminUserPage {
    #[serde(default)]
    pub users: Vec<AdminUser>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AdminUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AdminUser {
    pub fn into_member(self) -> AppResult<TeamMember> {
        let metadata = self.user_metadata;
        TeamMember::new(TeamMemberInput {
            id: UserId::from_uuid(self.id),
            email: self.email.unwrap_or_default(),
            full_name: metadata.full_name,
            role: metadata
                .role
                .as_deref()
                .and_then(|role| Role::from_str(role).ok()),
            points: metadata.points,
            commission_rate: metadata.commission_rate,
            capabilities: metadata.permissions.map(parse_capabilities),
        })
    }
}

/// Account metadata as stored by the admin console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl From<&TeamMember> for UserMetadata {
    fn from(member: &TeamMember) -> Self {
        Self {
            full_name: Some(member.display_name().to_owned()),
            role: Some(member.role().to_string()),
            points: Some(member.points()),
            commission_rate: Some(member.commission_rate()),
            permissions: member.capabilities().map(|capabilities| {
                capabilities
                    .iter()
                    .map(|capability| capability.as_str().to_owned())
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct AdminUserCreate<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub email_confirm: bool,
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Serialize)]
pub(super) struct AdminUserUpdate {
    pub user_metadata: UserMetadata,
}

/// Parses stored identifiers, dropping blank entries.
fn parse_capabilities(values: Vec<String>) -> Vec<Capability> {
    values
        .into_iter()
        .filter_map(|value| match Capability::from_str(value.as_str()) {
            Ok(capability) => Some(capability),
            Err(error) => {
                warn!(error = %error, "ignoring stored capability");
                None
            }
        })
        .collect()
}

/// Extracts the human-readable message of an error payload.
pub(super) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| body.trim().to_owned())
}
