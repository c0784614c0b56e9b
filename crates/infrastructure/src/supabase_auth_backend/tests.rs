use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use tinspace_application::{AuthBackend, SignUpRequest, TeamDirectory};
use tinspace_core::{AppError, AuthSession, AuthStateChangeKind, PasswordCredentials, UserId};
use tinspace_domain::{Capability, Role, TeamMemberChanges};
use uuid::Uuid;

use super::SupabaseAuthBackend;
use crate::SupabaseConfig;

const USER_ID: &str = "5b0f6f5e-3f43-4c8e-9a55-6c1f5d7c2a10";

fn backend(server: &MockServer, service_role_key: Option<&str>) -> SupabaseAuthBackend {
    let config = SupabaseConfig::new(
        server.base_url().as_str(),
        "anon-key",
        service_role_key.map(str::to_owned),
        Duration::from_secs(5),
    );
    let Ok(config) = config else {
        panic!("mock server URL should be a valid config");
    };
    let Ok(backend) = SupabaseAuthBackend::new(config) else {
        panic!("client should build");
    };
    backend
}

fn user_id() -> UserId {
    UserId::from_uuid(Uuid::parse_str(USER_ID).unwrap_or_default())
}

fn session() -> AuthSession {
    AuthSession::new(user_id(), None, "user-jwt", None, None)
}

fn credentials(password: &str) -> PasswordCredentials {
    let Ok(credentials) = PasswordCredentials::new("awa@tinspace.io", password) else {
        panic!("credentials should be valid");
    };
    credentials
}

#[tokio::test]
async fn sign_in_stores_session_and_broadcasts() {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "password")
                .header("apikey", "anon-key")
                .json_body(json!({"email": "awa@tinspace.io", "password": "secret"}));
            then.status(200).json_body(json!({
                "access_token": "user-jwt",
                "refresh_token": "refresh",
                "expires_in": 3600,
                "user": {"id": USER_ID, "email": "awa@tinspace.io"}
            }));
        })
        .await;
    let backend = backend(&server, None);
    let mut events = backend.subscribe();

    let session = backend.sign_in_with_password(&credentials("secret")).await;

    token.assert_async().await;
    assert_eq!(session.map(|session| session.user_id()), Ok(user_id()));
    assert_eq!(
        backend
            .current_session()
            .await
            .ok()
            .flatten()
            .map(|session| session.access_token().to_owned()),
        Some("user-jwt".to_owned())
    );
    assert_eq!(
        events.try_recv().map(|change| change.kind).ok(),
        Some(AuthStateChangeKind::SignedIn)
    );
}

#[tokio::test]
async fn rejected_sign_in_is_auth_error_with_backend_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/token");
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            }));
        })
        .await;
    let backend = backend(&server, None);

    let result = backend.sign_in_with_password(&credentials("wrong")).await;

    assert_eq!(
        result.map(|session| session.user_id()),
        Err(AppError::Auth("Invalid login credentials".to_owned()))
    );
    assert_eq!(backend.current_session().await, Ok(None));
}

#[tokio::test]
async fn profile_is_fetched_as_single_object() {
    let server = MockServer::start_async().await;
    let profile = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/profiles")
                .query_param("id", format!("eq.{USER_ID}"))
                .query_param("select", "full_name,role,avatar_url,permissions")
                .header("authorization", "Bearer user-jwt")
                .header("accept", "application/vnd.pgrst.object+json");
            then.status(200).json_body(json!({
                "full_name": "Awa Diallo",
                "role": "manager",
                "avatar_url": null,
                "permissions": null
            }));
        })
        .await;
    let backend = backend(&server, None);

    let record = backend.fetch_profile(&session()).await;

    profile.assert_async().await;
    let Ok(Some(record)) = record else {
        panic!("profile should be found");
    };
    assert_eq!(record.role.as_deref(), Some("manager"));
    assert_eq!(record.full_name.as_deref(), Some("Awa Diallo"));
    assert_eq!(record.capabilities, None);
}

#[tokio::test]
async fn not_acceptable_means_no_profile_row() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/profiles");
            then.status(406).json_body(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned"
            }));
        })
        .await;
    let backend = backend(&server, None);

    assert_eq!(backend.fetch_profile(&session()).await, Ok(None));
}

#[tokio::test]
async fn profile_server_error_is_internal() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/profiles");
            then.status(500).body("boom");
        })
        .await;
    let backend = backend(&server, None);

    assert!(matches!(
        backend.fetch_profile(&session()).await,
        Err(AppError::Internal(_))
    ));
}

#[tokio::test]
async fn sign_out_clears_session_and_broadcasts() {
    let server = MockServer::start_async().await;
    let logout = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/logout")
                .header("authorization", "Bearer user-jwt");
            then.status(204);
        })
        .await;
    let backend = backend(&server, None);
    backend.restore_session(session()).await;
    let mut events = backend.subscribe();

    assert_eq!(backend.sign_out().await, Ok(()));

    logout.assert_async().await;
    assert_eq!(backend.current_session().await, Ok(None));
    assert_eq!(
        events.try_recv().map(|change| change.kind).ok(),
        Some(AuthStateChangeKind::SignedOut)
    );
}

#[tokio::test]
async fn team_administration_requires_service_role_key() {
    let server = MockServer::start_async().await;
    let backend = backend(&server, None);

    assert!(matches!(
        backend.list_members().await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn list_members_maps_metadata() {
    let server = MockServer::start_async().await;
    let users = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/admin/users")
                .query_param("page", "1")
                .header("apikey", "service-key")
                .header("authorization", "Bearer service-key");
            then.status(200).json_body(json!({
                "users": [
                    {
                        "id": USER_ID,
                        "email": "awa@tinspace.io",
                        "user_metadata": {"full_name": "Awa Diallo", "role": "commercial", "points": 120}
                    },
                    {
                        "id": "0a8d7c3e-6f21-4b9a-8e57-1d2c3b4a5f60",
                        "email": "broken@tinspace.io",
                        "user_metadata": {"points": -4}
                    }
                ]
            }));
        })
        .await;
    let backend = backend(&server, Some("service-key"));

    let members = backend.list_members().await.unwrap_or_default();

    users.assert_async().await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].display_name(), "Awa Diallo");
    assert_eq!(
        members[0]
            .estimated_commission()
            .map(|value| value.to_string()),
        Ok("36.00".to_owned())
    );
}

#[tokio::test]
async fn update_member_puts_merged_metadata() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/auth/v1/admin/users/{USER_ID}"));
            then.status(200).json_body(json!({
                "id": USER_ID,
                "email": "awa@tinspace.io",
                "user_metadata": {"full_name": "Awa Diallo", "role": "commercial", "points": 120}
            }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(format!("/auth/v1/admin/users/{USER_ID}"))
                .json_body(json!({
                    "user_metadata": {
                        "full_name": "Awa Diallo",
                        "role": "admin",
                        "points": 120,
                        "commission_rate": 0.03,
                        "permissions": ["all_access"]
                    }
                }));
            then.status(200).json_body(json!({
                "id": USER_ID,
                "email": "awa@tinspace.io",
                "user_metadata": {
                    "full_name": "Awa Diallo",
                    "role": "admin",
                    "points": 120,
                    "commission_rate": 0.03,
                    "permissions": ["all_access"]
                }
            }));
        })
        .await;
    let backend = backend(&server, Some("service-key"));
    let changes = TeamMemberChanges {
        role: Some(Role::Admin),
        capabilities: Some(vec![Capability::AllAccess]),
        ..TeamMemberChanges::default()
    };

    let updated = backend.update_member(user_id(), &changes).await;

    update.assert_async().await;
    let Ok(updated) = updated else {
        panic!("update should succeed");
    };
    assert_eq!(updated.role(), &Role::Admin);
}

#[tokio::test]
async fn missing_member_is_none_and_delete_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/auth/v1/admin/users/{USER_ID}"));
            then.status(404).json_body(json!({"msg": "User not found"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path(format!("/auth/v1/admin/users/{USER_ID}"));
            then.status(404).json_body(json!({"msg": "User not found"}));
        })
        .await;
    let backend = backend(&server, Some("service-key"));

    assert_eq!(backend.find_member(user_id()).await, Ok(None));
    assert!(matches!(
        backend.remove_member(user_id()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn sign_up_sends_profile_metadata_and_stores_session() {
    let server = MockServer::start_async().await;
    let signup = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/signup")
                .header("apikey", "anon-key")
                .json_body(json!({
                    "email": "awa@tinspace.io",
                    "password": "secret",
                    "data": {"full_name": "Awa Diallo", "role": "prospecteur"}
                }));
            then.status(200).json_body(json!({
                "access_token": "user-jwt",
                "expires_in": 3600,
                "user": {"id": USER_ID, "email": "awa@tinspace.io"}
            }));
        })
        .await;
    let backend = backend(&server, None);
    let mut events = backend.subscribe();
    let request = SignUpRequest::new(credentials("secret")).with_full_name("Awa Diallo");

    let session = backend.sign_up(&request).await;

    signup.assert_async().await;
    assert_eq!(
        session.map(|session| session.map(|session| session.user_id())),
        Ok(Some(user_id()))
    );
    assert_eq!(
        events.try_recv().map(|change| change.kind).ok(),
        Some(AuthStateChangeKind::SignedIn)
    );
}

#[tokio::test]
async fn unconfirmed_sign_up_returns_no_session() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/signup");
            then.status(200)
                .json_body(json!({"id": USER_ID, "email": "awa@tinspace.io"}));
        })
        .await;
    let backend = backend(&server, None);

    let session = backend
        .sign_up(&SignUpRequest::new(credentials("secret")))
        .await;

    assert_eq!(session, Ok(None));
    assert_eq!(backend.current_session().await, Ok(None));
}

#[tokio::test]
async fn create_member_posts_confirmed_account_with_metadata() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/admin/users")
                .header("authorization", "Bearer service-key")
                .json_body(json!({
                    "email": "awa@tinspace.io",
                    "password": "secret",
                    "email_confirm": true,
                    "user_metadata": {
                        "full_name": "Awa Diallo",
                        "role": "manager",
                        "points": 0,
                        "commission_rate": 0.03
                    }
                }));
            then.status(200).json_body(json!({
                "id": USER_ID,
                "email": "awa@tinspace.io",
                "user_metadata": {
                    "full_name": "Awa Diallo",
                    "role": "manager",
                    "points": 0,
                    "commission_rate": 0.03
                }
            }));
        })
        .await;
    let backend = backend(&server, Some("service-key"));
    let profile = TeamMemberChanges {
        full_name: Some("Awa Diallo".to_owned()),
        role: Some(Role::Manager),
        ..TeamMemberChanges::default()
    };

    let created = backend.create_member(&credentials("secret"), &profile).await;

    create.assert_async().await;
    let Ok(created) = created else {
        panic!("creation should succeed");
    };
    assert_eq!(created.id(), user_id());
    assert_eq!(created.role(), &Role::Manager);
}

#[tokio::test]
async fn create_member_with_taken_email_is_conflict() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/admin/users");
            then.status(422).json_body(json!({
                "msg": "A user with this email address has already been registered"
            }));
        })
        .await;
    let backend = backend(&server, Some("service-key"));

    let result = backend
        .create_member(&credentials("secret"), &TeamMemberChanges::default())
        .await;

    assert_eq!(
        result.map(|member| member.id()),
        Err(AppError::Conflict(
            "A user with this email address has already been registered".to_owned()
        ))
    );
}
