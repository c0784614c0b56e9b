use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tinspace_core::{AppError, NonEmptyString};

/// Grantable action or view.
///
/// Capabilities are flat: no capability implies another, except that
/// [`Capability::AllAccess`] satisfies every check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    /// Wildcard held by administrators only.
    AllAccess,
    /// Allows viewing the shared user dashboard.
    ViewDashboard,
    /// Allows creating, editing and viewing prospects.
    ManageProspects,
    /// Allows creating, editing and viewing partners.
    ManagePartners,
    /// Allows managing activities and events.
    ManageActivities,
    /// Allows managing ticket sales.
    ManageSalesTickets,
    /// Allows viewing and coaching the team.
    ManageTeam,
    /// Allows opening one's own profile.
    AccessUserProfile,
    /// Allows opening one's own settings.
    AccessUserSettings,
    /// Allows viewing the prospector dashboard.
    ViewProspectorDashboard,
    /// Allows viewing the partner space dashboard.
    ViewPartnerDashboard,
    /// Allows viewing the ticketing dashboard.
    ViewTicketingDashboard,
    /// Allows viewing the support dashboard.
    ViewSupportDashboard,
    /// Allows viewing the admin dashboard.
    AdminViewDashboard,
    /// Allows creating, editing and removing user accounts.
    ManageUsers,
    /// Allows managing every prospect regardless of owner.
    AdminManageProspects,
    /// Allows running marketing campaigns.
    ManageMarketingCampaigns,
    /// Allows generating commercial proposals.
    GenerateProposals,
    /// Allows exporting data.
    ExportData,
    /// Allows viewing team activity tracking.
    ViewTeamActivity,
    /// Allows changing global platform settings.
    ManageGlobalSettings,
    /// Allows managing platform-wide events.
    ManagePlatformEvents,
    /// Allows publishing internal announcements.
    ManageInternalAnnouncements,
    /// Identifier not known to this build, kept verbatim.
    Custom(NonEmptyString),
}

impl Capability {
    /// Returns the stable storage value for this capability.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AllAccess => "all_access",
            Self::ViewDashboard => "view_dashboard",
            Self::ManageProspects => "manage_prospects",
            Self::ManagePartners => "manage_partners",
            Self::ManageActivities => "manage_activities",
            Self::ManageSalesTickets => "manage_sales_tickets",
            Self::ManageTeam => "manage_team",
            Self::AccessUserProfile => "access_user_profile",
            Self::AccessUserSettings => "access_user_settings",
            Self::ViewProspectorDashboard => "view_prospector_dashboard",
            Self::ViewPartnerDashboard => "view_partner_dashboard",
            Self::ViewTicketingDashboard => "view_ticketing_dashboard",
            Self::ViewSupportDashboard => "view_support_dashboard",
            Self::AdminViewDashboard => "admin_view_dashboard",
            Self::ManageUsers => "manage_users",
            Self::AdminManageProspects => "admin_manage_prospects",
            Self::ManageMarketingCampaigns => "manage_marketing_campaigns",
            Self::GenerateProposals => "generate_proposals",
            Self::ExportData => "export_data",
            Self::ViewTeamActivity => "view_team_activity",
            Self::ManageGlobalSettings => "manage_global_settings",
            Self::ManagePlatformEvents => "manage_platform_events",
            Self::ManageInternalAnnouncements => "manage_internal_announcements",
            Self::Custom(value) => value.as_str(),
        }
    }

    /// Returns all capabilities known to this build.
    #[must_use]
    pub fn known() -> &'static [Self] {
        const KNOWN: &[Capability] = &[
            Capability::AllAccess,
            Capability::ViewDashboard,
            Capability::ManageProspects,
            Capability::ManagePartners,
            Capability::ManageActivities,
            Capability::ManageSalesTickets,
            Capability::ManageTeam,
            Capability::AccessUserProfile,
            Capability::AccessUserSettings,
            Capability::ViewProspectorDashboard,
            Capability::ViewPartnerDashboard,
            Capability::ViewTicketingDashboard,
            Capability::ViewSupportDashboard,
            Capability::AdminViewDashboard,
            Capability::ManageUsers,
            Capability::AdminManageProspects,
            Capability::ManageMarketingCampaigns,
            Capability::GenerateProposals,
            Capability::ExportData,
            Capability::ViewTeamActivity,
            Capability::ManageGlobalSettings,
            Capability::ManagePlatformEvents,
            Capability::ManageInternalAnnouncements,
        ];

        KNOWN
    }

    /// Returns whether this is the wildcard capability.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::AllAccess)
    }

    /// Returns whether this identifier is outside the known catalogue.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        // Older account metadata stored the wildcard as "all".
        if value == "all" {
            return Ok(Self::AllAccess);
        }

        if let Some(known) = Self::known()
            .iter()
            .find(|capability| capability.as_str() == value)
        {
            return Ok(known.clone());
        }

        NonEmptyString::new(value)
            .map(Self::Custom)
            .map_err(|_| AppError::Validation("capability must not be empty".to_owned()))
    }
}

impl TryFrom<String> for Capability {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.as_str().to_owned()
    }
}

impl Display for Capability {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
