//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod env_config;
mod in_memory_auth_backend;
mod supabase_auth_backend;
mod supabase_config;

pub use env_config::{parse_env_u64, required_env};
pub use in_memory_auth_backend::{DEMO_PASSWORD, InMemoryAuthBackend};
pub use supabase_auth_backend::SupabaseAuthBackend;
pub use supabase_config::SupabaseConfig;
