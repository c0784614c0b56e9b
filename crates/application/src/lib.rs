//! Application services and ports.

#![forbid(unsafe_code)]

mod session_service;
mod team_service;

pub use session_service::{
    AuthBackend, DEFAULT_REFRESH_TIMEOUT, IdentityListener, ListenerId, ProfileRecord,
    SessionService, SignUpRequest,
};
pub use team_service::{TeamDirectory, TeamMemberSummary, TeamService};
