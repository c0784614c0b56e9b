use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tinspace_core::{AppError, AppResult, NonEmptyString};

use crate::Capability;

static NO_CAPABILITIES: BTreeSet<Capability> = BTreeSet::new();

/// Named bundle of capabilities held by exactly one identity at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    /// Platform administrator.
    Admin,
    /// Team manager.
    Manager,
    /// Sales representative.
    Commercial,
    /// Prospector.
    Prospecteur,
    /// External partner.
    Partenaire,
    /// Ticketing staff.
    Billetterie,
    /// Customer support staff.
    Support,
    /// Role identifier not known to this build, kept verbatim.
    Other(NonEmptyString),
}

impl Role {
    /// Returns the stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Commercial => "commercial",
            Self::Prospecteur => "prospecteur",
            Self::Partenaire => "partenaire",
            Self::Billetterie => "billetterie",
            Self::Support => "support",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Returns all roles known to this build.
    #[must_use]
    pub fn known() -> &'static [Self] {
        const KNOWN: &[Role] = &[
            Role::Admin,
            Role::Manager,
            Role::Commercial,
            Role::Prospecteur,
            Role::Partenaire,
            Role::Billetterie,
            Role::Support,
        ];

        KNOWN
    }

    /// Returns whether this is the administrator role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Some(known) = Self::known().iter().find(|role| role.as_str() == value) {
            return Ok(known.clone());
        }

        NonEmptyString::new(value)
            .map(Self::Other)
            .map_err(|_| AppError::Validation("role must not be empty".to_owned()))
    }
}

impl TryFrom<String> for Role {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_owned()
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Declared label and default capabilities of one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    role: Role,
    label: String,
    capabilities: BTreeSet<Capability>,
}

impl RoleDefinition {
    /// Creates a role definition.
    #[must_use]
    pub fn new(
        role: Role,
        label: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            role,
            label: label.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Returns the role this definition describes.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// Returns the default capability set.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }
}

/// Single source of truth for the role to capability mapping.
///
/// # Invariants
/// - `admin` always maps to exactly `{all_access}`.
/// - No other role maps to `all_access`.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    order: Vec<Role>,
    definitions: HashMap<Role, RoleDefinition>,
}

impl RoleRegistry {
    /// Builds a registry from role definitions.
    ///
    /// The admin definition is added when missing. Duplicate roles, an admin
    /// definition other than `{all_access}`, and `all_access` on any other
    /// role are rejected.
    pub fn new(definitions: impl IntoIterator<Item = RoleDefinition>) -> AppResult<Self> {
        let mut order = Vec::new();
        let mut by_role = HashMap::new();

        for definition in definitions {
            if definition.role.is_admin() {
                let expected = BTreeSet::from([Capability::AllAccess]);
                if definition.capabilities != expected {
                    return Err(AppError::Validation(format!(
                        "role '{}' must grant exactly '{}'",
                        definition.role,
                        Capability::AllAccess
                    )));
                }
            } else if definition.capabilities.contains(&Capability::AllAccess) {
                return Err(AppError::Validation(format!(
                    "role '{}' cannot grant '{}'",
                    definition.role,
                    Capability::AllAccess
                )));
            }

            if by_role.contains_key(&definition.role) {
                return Err(AppError::Conflict(format!(
                    "role '{}' is defined more than once",
                    definition.role
                )));
            }

            order.push(definition.role.clone());
            by_role.insert(definition.role.clone(), definition);
        }

        if !by_role.contains_key(&Role::Admin) {
            order.insert(0, Role::Admin);
            by_role.insert(Role::Admin, admin_definition());
        }

        Ok(Self {
            order,
            definitions: by_role,
        })
    }

    /// Returns the registry shipped with the product.
    #[must_use]
    pub fn standard() -> Self {
        let definitions = standard_definitions();
        let order = definitions
            .iter()
            .map(|definition| definition.role.clone())
            .collect();
        let definitions = definitions
            .into_iter()
            .map(|definition| (definition.role.clone(), definition))
            .collect();

        Self { order, definitions }
    }

    /// Returns the declared capabilities of a role, empty for unknown roles.
    #[must_use]
    pub fn capabilities_for(&self, role: &Role) -> &BTreeSet<Capability> {
        self.definitions
            .get(role)
            .map(RoleDefinition::capabilities)
            .unwrap_or(&NO_CAPABILITIES)
    }

    /// Returns the display label of a role, the raw identifier for unknown roles.
    #[must_use]
    pub fn label_for<'a>(&'a self, role: &'a Role) -> &'a str {
        self.definitions
            .get(role)
            .map(RoleDefinition::label)
            .unwrap_or_else(|| role.as_str())
    }

    /// Returns the declared roles in declaration order.
    pub fn roles(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.order
            .iter()
            .filter_map(|role| self.definitions.get(role))
    }

    /// Resolves the effective capabilities for an account.
    ///
    /// An explicit stored list replaces the role defaults for non-admin roles
    /// and never carries `all_access`; admin always resolves to
    /// `{all_access}`.
    #[must_use]
    pub fn resolve_capabilities(
        &self,
        role: &Role,
        stored: Option<&[Capability]>,
    ) -> BTreeSet<Capability> {
        if role.is_admin() {
            return BTreeSet::from([Capability::AllAccess]);
        }

        match stored {
            Some(stored) => stored
                .iter()
                .filter(|capability| !capability.is_wildcard())
                .cloned()
                .collect(),
            None => self.capabilities_for(role).clone(),
        }
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn admin_definition() -> RoleDefinition {
    RoleDefinition::new(Role::Admin, "Administrateur", [Capability::AllAccess])
}

fn standard_definitions() -> Vec<RoleDefinition> {
    use Capability::{
        AccessUserProfile, AccessUserSettings, ManageActivities, ManagePartners, ManageProspects,
        ManageSalesTickets, ManageTeam, ViewDashboard, ViewPartnerDashboard,
        ViewProspectorDashboard, ViewSupportDashboard, ViewTicketingDashboard,
    };

    vec![
        admin_definition(),
        RoleDefinition::new(
            Role::Manager,
            "Manager",
            [
                ViewDashboard,
                ManageProspects,
                ManagePartners,
                ManageActivities,
                ManageSalesTickets,
                ManageTeam,
                AccessUserProfile,
                AccessUserSettings,
            ],
        ),
        RoleDefinition::new(
            Role::Commercial,
            "Commercial",
            [
                ViewDashboard,
                ManageProspects,
                ManagePartners,
                ManageActivities,
                ManageSalesTickets,
                AccessUserProfile,
                AccessUserSettings,
            ],
        ),
        RoleDefinition::new(
            Role::Prospecteur,
            "Prospecteur",
            [
                ViewProspectorDashboard,
                ManageProspects,
                ManagePartners,
                ManageActivities,
                AccessUserProfile,
                AccessUserSettings,
            ],
        ),
        RoleDefinition::new(
            Role::Partenaire,
            "Partenaire",
            [
                ViewPartnerDashboard,
                ManagePartners,
                ManageActivities,
                AccessUserProfile,
                AccessUserSettings,
            ],
        ),
        RoleDefinition::new(
            Role::Billetterie,
            "Billetterie",
            [
                ViewTicketingDashboard,
                ManageActivities,
                ManageSalesTickets,
                AccessUserProfile,
                AccessUserSettings,
            ],
        ),
        RoleDefinition::new(
            Role::Support,
            "Support Client",
            [ViewSupportDashboard, AccessUserProfile, AccessUserSettings],
        ),
    ]
}
