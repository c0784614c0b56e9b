//! Environment variable helpers shared by configuration loaders.

use std::env;

use tinspace_core::{AppError, AppResult};

/// Reads a variable that must be set.
pub fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

/// Reads an unsigned integer variable, falling back to `default` when unset.
pub fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    parse_u64_value(name, env::var(name).ok(), default)
}

fn parse_u64_value(name: &str, value: Option<String>, default: u64) -> AppResult<u64> {
    match value {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
