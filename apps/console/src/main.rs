//! Tin Space Connect access console.
//!
//! Signs in against the configured backend, prints what the signed-in
//! account is allowed to see and its team commission table, then signs out.

#![forbid(unsafe_code)]

mod console_config;

use std::sync::Arc;

use tinspace_application::{
    AuthBackend, SessionService, TeamDirectory, TeamMemberSummary, TeamService,
};
use tinspace_core::{AppError, AppResult, PasswordCredentials};
use tinspace_domain::{
    Identity, RoleRegistry, TeamFilter, can_access_route, filter_navigation, find_route,
    landing_path, navigation_items,
};
use tinspace_infrastructure::{InMemoryAuthBackend, SupabaseAuthBackend, SupabaseConfig};
use tracing::{info, warn};

use crate::console_config::{BackendKind, ConsoleConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ConsoleConfig::load()?;
    let (auth_backend, team_directory) = build_backend(config.backend)?;
    let registry = Arc::new(RoleRegistry::standard());
    let session_service = SessionService::new(auth_backend, registry)
        .with_refresh_timeout(config.refresh_timeout);
    let team_service = TeamService::new(team_directory, session_service.clone());
    let auth_listener = session_service.spawn_auth_state_listener();

    info!(
        backend = ?config.backend,
        email = %config.email,
        refresh_timeout_ms = config.refresh_timeout.as_millis(),
        "tinspace-console started"
    );

    let credentials =
        PasswordCredentials::new(config.email.as_str(), config.password.as_str())?;
    let identity = session_service.sign_in(&credentials).await?;

    let report = print_report(&identity, &team_service).await;

    if let Err(error) = session_service.sign_out().await {
        warn!(error = %error, "sign-out failed");
    }
    auth_listener.abort();

    report
}

fn build_backend(
    kind: BackendKind,
) -> AppResult<(Arc<dyn AuthBackend>, Arc<dyn TeamDirectory>)> {
    match kind {
        BackendKind::Supabase => {
            let backend = Arc::new(SupabaseAuthBackend::new(SupabaseConfig::from_env()?)?);
            let auth_backend: Arc<dyn AuthBackend> = backend.clone();
            let team_directory: Arc<dyn TeamDirectory> = backend;
            Ok((auth_backend, team_directory))
        }
        BackendKind::Memory => {
            let backend = Arc::new(InMemoryAuthBackend::with_demo_data()?);
            let auth_backend: Arc<dyn AuthBackend> = backend.clone();
            let team_directory: Arc<dyn TeamDirectory> = backend;
            Ok((auth_backend, team_directory))
        }
    }
}

async fn print_report(identity: &Identity, team_service: &TeamService) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(identity).map_err(|error| {
        AppError::Internal(format!("failed to render identity: {error}"))
    })?;
    println!("Identity\n{rendered}\n");
    println!("Landing page: {}\n", landing_path(identity));

    println!("Navigation");
    let items = navigation_items();
    for item in filter_navigation(identity, &items) {
        println!("  {:<28} {}", item.label(), item.path());
    }
    println!();

    let team_visible = find_route("/team").is_some_and(|rule| can_access_route(identity, &rule));
    let rows = team_service
        .list_team(identity, &TeamFilter::default())
        .await?;
    if team_visible {
        println!("Team commissions");
    } else {
        println!("My commission");
    }
    print_commission_table(&rows);

    Ok(())
}

fn print_commission_table(rows: &[TeamMemberSummary]) {
    println!(
        "  {:<24} {:<16} {:>8} {:>7} {:>12}",
        "Name", "Role", "Points", "Rate", "Commission"
    );
    for row in rows {
        println!(
            "  {:<24} {:<16} {:>8} {:>6.1}% {:>10} EUR",
            row.member.display_name(),
            row.role_label,
            row.member.points(),
            row.member.commission_rate() * 100.0,
            row.commission.to_string(),
        );
    }
}
