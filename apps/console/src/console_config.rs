use std::env;
use std::time::Duration;

use tinspace_core::{AppError, AppResult};
use tinspace_infrastructure::{DEMO_PASSWORD, parse_env_u64, required_env};
use tracing_subscriber::EnvFilter;

const DEMO_EMAIL: &str = "admin@tinspace.demo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Supabase,
    Memory,
}

#[derive(Clone)]
pub struct ConsoleConfig {
    pub backend: BackendKind,
    pub email: String,
    pub password: String,
    pub refresh_timeout: Duration,
}

impl ConsoleConfig {
    pub fn load() -> AppResult<Self> {
        let backend = match env::var("TINSPACE_BACKEND")
            .unwrap_or_else(|_| "memory".to_owned())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "supabase" => BackendKind::Supabase,
            "memory" => BackendKind::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "TINSPACE_BACKEND must be 'supabase' or 'memory', got '{other}'"
                )));
            }
        };

        let (email, password) = match backend {
            BackendKind::Supabase => (
                required_env("TINSPACE_EMAIL")?,
                required_env("TINSPACE_PASSWORD")?,
            ),
            BackendKind::Memory => (
                env::var("TINSPACE_EMAIL").unwrap_or_else(|_| DEMO_EMAIL.to_owned()),
                env::var("TINSPACE_PASSWORD").unwrap_or_else(|_| DEMO_PASSWORD.to_owned()),
            ),
        };

        let refresh_timeout_ms = parse_env_u64("TINSPACE_REFRESH_TIMEOUT_MS", 10_000)?;
        if refresh_timeout_ms == 0 {
            return Err(AppError::Validation(
                "TINSPACE_REFRESH_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            backend,
            email,
            password,
            refresh_timeout: Duration::from_millis(refresh_timeout_ms),
        })
    }
}

impl std::fmt::Debug for ConsoleConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ConsoleConfig")
            .field("backend", &self.backend)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
