use std::collections::BTreeSet;

use serde::Serialize;
use tinspace_core::UserId;

use crate::{Capability, Role, RoleRegistry};

static NO_CAPABILITIES: BTreeSet<Capability> = BTreeSet::new();

/// Resolved representation of who is asking.
///
/// Owned by the session provider; every other component receives it by
/// reference and never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// No authenticated session.
    #[default]
    Anonymous,
    /// Authenticated account with a resolved role.
    Authenticated(AuthenticatedIdentity),
}

/// Identity of a signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    id: UserId,
    role: Role,
    capabilities: BTreeSet<Capability>,
    display_name: String,
}

impl Identity {
    /// Resolves an authenticated identity through the role registry.
    #[must_use]
    pub fn resolve(
        registry: &RoleRegistry,
        id: UserId,
        role: Role,
        display_name: impl Into<String>,
        stored_capabilities: Option<&[Capability]>,
    ) -> Self {
        let capabilities = registry.resolve_capabilities(&role, stored_capabilities);
        Self::Authenticated(AuthenticatedIdentity {
            id,
            role,
            capabilities,
            display_name: display_name.into(),
        })
    }

    /// Returns whether no session is attached.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(identity) => Some(identity.id),
        }
    }

    /// Returns the account role.
    #[must_use]
    pub fn role(&self) -> Option<&Role> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(identity) => Some(&identity.role),
        }
    }

    /// Returns the granted capabilities, empty when anonymous.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        match self {
            Self::Anonymous => &NO_CAPABILITIES,
            Self::Authenticated(identity) => &identity.capabilities,
        }
    }

    /// Returns the display name, empty when anonymous.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Anonymous => "",
            Self::Authenticated(identity) => identity.display_name.as_str(),
        }
    }
}

impl AuthenticatedIdentity {
    /// Returns the account identifier.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the account role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns the granted capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }
}
