use std::env;
use std::time::Duration;

use tinspace_core::{AppError, AppResult};
use url::Url;

use crate::env_config::{parse_env_u64, required_env};

const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Connection settings of the hosted backend.
#[derive(Clone)]
pub struct SupabaseConfig {
    base_url: Url,
    anon_key: String,
    service_role_key: Option<String>,
    http_timeout: Duration,
}

impl SupabaseConfig {
    /// Creates a validated configuration.
    pub fn new(
        base_url: &str,
        anon_key: impl Into<String>,
        service_role_key: Option<String>,
        http_timeout: Duration,
    ) -> AppResult<Self> {
        let mut base_url = Url::parse(base_url.trim()).map_err(|error| {
            AppError::Validation(format!("invalid backend URL '{base_url}': {error}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "backend URL must use http or https, got '{}'",
                base_url.scheme()
            )));
        }
        // Relative joins replace the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(path.as_str());
        }

        let anon_key = anon_key.into();
        if anon_key.trim().is_empty() {
            return Err(AppError::Validation(
                "backend anon key must not be empty".to_owned(),
            ));
        }

        if http_timeout.is_zero() {
            return Err(AppError::Validation(
                "backend HTTP timeout must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            base_url,
            anon_key,
            service_role_key: service_role_key
                .map(|key| key.trim().to_owned())
                .filter(|key| !key.is_empty()),
            http_timeout,
        })
    }

    /// Loads the configuration from `TINSPACE_BAAS_*` environment variables.
    pub fn from_env() -> AppResult<Self> {
        let base_url = required_env("TINSPACE_BAAS_URL")?;
        let anon_key = required_env("TINSPACE_BAAS_ANON_KEY")?;
        let service_role_key = env::var("TINSPACE_BAAS_SERVICE_ROLE_KEY").ok();
        let http_timeout_ms = parse_env_u64("TINSPACE_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;

        Self::new(
            base_url.as_str(),
            anon_key,
            service_role_key,
            Duration::from_millis(http_timeout_ms),
        )
    }

    /// Returns the base URL, always ending with `/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the public API key.
    #[must_use]
    pub fn anon_key(&self) -> &str {
        self.anon_key.as_str()
    }

    /// Returns the administrative API key, if configured.
    #[must_use]
    pub fn service_role_key(&self) -> Option<&str> {
        self.service_role_key.as_deref()
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseConfig")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"<redacted>")
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "<redacted>"),
            )
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}
