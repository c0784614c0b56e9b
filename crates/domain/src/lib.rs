//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;
mod capability;
mod commission;
mod identity;
mod navigation;
mod role;
mod team;

pub use access::{
    Guarded, RouteDecision, can_access_capability, can_access_route, filter_navigation,
    guard_route,
};
pub use capability::Capability;
pub use commission::{
    CommissionEstimate, DEFAULT_COMMISSION_RATE, POINT_VALUE_FOR_COMMISSION, estimate_commission,
    validate_commission_rate, validate_points,
};
pub use identity::{AuthenticatedIdentity, Identity};
pub use navigation::{
    LOGIN_PATH, NavigationArea, NavigationItem, RouteGuardRule, UNAUTHORIZED_PATH, find_route,
    landing_path, navigation_items, route_table,
};
pub use role::{Role, RoleDefinition, RoleRegistry};
pub use team::{TeamFilter, TeamMember, TeamMemberChanges, TeamMemberInput};
