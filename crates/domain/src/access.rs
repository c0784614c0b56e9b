//! Access decisions over an explicitly passed [`Identity`].
//!
//! Every function here is pure and total: denial is `false`, never an error.

use serde::Serialize;

use crate::{Capability, Identity, LOGIN_PATH, RouteGuardRule, UNAUTHORIZED_PATH};

/// Anything the navigation filter can decide on.
pub trait Guarded {
    /// Returns the rule guarding this item.
    fn guard(&self) -> &RouteGuardRule;
}

impl Guarded for RouteGuardRule {
    fn guard(&self) -> &RouteGuardRule {
        self
    }
}

/// Outcome of a route guard evaluated at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Render the route.
    Allow,
    /// No session: send the visitor to the login flow.
    RedirectToLogin,
    /// Signed in but missing every required capability.
    RedirectToUnauthorized,
}

impl RouteDecision {
    /// Returns the page to redirect to, or `None` when the route renders.
    #[must_use]
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::RedirectToLogin => Some(LOGIN_PATH),
            Self::RedirectToUnauthorized => Some(UNAUTHORIZED_PATH),
        }
    }
}

/// Returns whether the identity holds the capability or the wildcard.
#[must_use]
pub fn can_access_capability(identity: &Identity, capability: &Capability) -> bool {
    let capabilities = identity.capabilities();
    capabilities.contains(&Capability::AllAccess) || capabilities.contains(capability)
}

/// Returns whether the identity satisfies at least one requirement of the rule.
///
/// A rule without requirements admits any authenticated identity.
#[must_use]
pub fn can_access_route(identity: &Identity, rule: &RouteGuardRule) -> bool {
    if identity.is_anonymous() {
        return false;
    }

    let required = rule.required_capabilities();
    required.is_empty()
        || required
            .iter()
            .any(|capability| can_access_capability(identity, capability))
}

/// Returns the accessible items, preserving input order.
#[must_use]
pub fn filter_navigation<'a, T: Guarded>(identity: &Identity, routes: &'a [T]) -> Vec<&'a T> {
    routes
        .iter()
        .filter(|route| can_access_route(identity, route.guard()))
        .collect()
}

/// Decides what a protected route renders for the identity.
#[must_use]
pub fn guard_route(identity: &Identity, rule: &RouteGuardRule) -> RouteDecision {
    if identity.is_anonymous() {
        RouteDecision::RedirectToLogin
    } else if can_access_route(identity, rule) {
        RouteDecision::Allow
    } else {
        RouteDecision::RedirectToUnauthorized
    }
}
