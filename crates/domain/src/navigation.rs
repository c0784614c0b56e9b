use std::collections::BTreeSet;

use serde::Serialize;

use crate::{Capability, Guarded, Identity, Role, can_access_route};

/// Path of the login page anonymous visitors are sent to.
pub const LOGIN_PATH: &str = "/login";

/// Path of the page shown when a signed-in user lacks access.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Declarative guard of one navigable route.
///
/// Requirements use OR semantics: holding any one suffices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteGuardRule {
    path: String,
    required_capabilities: BTreeSet<Capability>,
}

impl RouteGuardRule {
    /// Creates a route guard rule.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        required_capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            path: path.into(),
            required_capabilities: required_capabilities.into_iter().collect(),
        }
    }

    /// Returns the guarded path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the capabilities any one of which opens the route.
    #[must_use]
    pub fn required_capabilities(&self) -> &BTreeSet<Capability> {
        &self.required_capabilities
    }
}

/// Which menu a navigation entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationArea {
    /// Main application sidebar.
    Workspace,
    /// Administration console sidebar.
    Admin,
}

/// Sidebar entry backed by a route guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationItem {
    label: String,
    area: NavigationArea,
    rule: RouteGuardRule,
}

impl NavigationItem {
    /// Creates a navigation entry.
    #[must_use]
    pub fn new(label: impl Into<String>, area: NavigationArea, rule: RouteGuardRule) -> Self {
        Self {
            label: label.into(),
            area,
            rule,
        }
    }

    /// Returns the menu label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// Returns the menu the entry belongs to.
    #[must_use]
    pub fn area(&self) -> NavigationArea {
        self.area
    }

    /// Returns the target path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.rule.path()
    }
}

impl Guarded for NavigationItem {
    fn guard(&self) -> &RouteGuardRule {
        &self.rule
    }
}

/// Returns the guard of every protected route of the application.
#[must_use]
pub fn route_table() -> Vec<RouteGuardRule> {
    use Capability::*;

    vec![
        RouteGuardRule::new("/dashboard", []),
        RouteGuardRule::new("/dashboard/prospecteur", [ViewProspectorDashboard]),
        RouteGuardRule::new("/dashboard/partenaire", [ViewPartnerDashboard]),
        RouteGuardRule::new("/dashboard/billetterie", [ViewTicketingDashboard]),
        RouteGuardRule::new("/dashboard/support", [ViewSupportDashboard]),
        RouteGuardRule::new("/prospects", [ManageProspects]),
        RouteGuardRule::new("/partners", [ManagePartners]),
        RouteGuardRule::new("/activities", [ManageActivities]),
        RouteGuardRule::new("/team", [ManageTeam]),
        RouteGuardRule::new("/tickets", [ManageSalesTickets]),
        RouteGuardRule::new("/profile", []),
        RouteGuardRule::new("/settings", []),
        RouteGuardRule::new("/admin/dashboard", [AdminViewDashboard]),
        RouteGuardRule::new("/admin/team-management", [ManageUsers]),
        RouteGuardRule::new("/admin/events-management", [ManagePlatformEvents]),
        RouteGuardRule::new("/admin/announcements", [ManageInternalAnnouncements]),
        RouteGuardRule::new("/admin/prospects-management", [AdminManageProspects]),
        RouteGuardRule::new("/admin/marketing", [ManageMarketingCampaigns]),
        RouteGuardRule::new("/admin/reports", [ExportData]),
        RouteGuardRule::new("/admin/proposals", [GenerateProposals]),
        RouteGuardRule::new("/admin/team-activity", [ViewTeamActivity]),
        RouteGuardRule::new("/admin/settings", [ManageGlobalSettings]),
    ]
}

/// Finds the guard of a path in [`route_table`].
#[must_use]
pub fn find_route(path: &str) -> Option<RouteGuardRule> {
    let path = path.trim_end_matches('/');
    route_table().into_iter().find(|rule| rule.path() == path)
}

/// Returns the sidebar entries of both menus, in display order.
#[must_use]
pub fn navigation_items() -> Vec<NavigationItem> {
    use Capability::*;
    use NavigationArea::{Admin, Workspace};

    let item = |label: &str, area, path: &str, required: &[Capability]| {
        NavigationItem::new(
            label,
            area,
            RouteGuardRule::new(path, required.iter().cloned()),
        )
    };

    vec![
        item("Tableau de Bord", Workspace, "/dashboard", &[ViewDashboard]),
        item("Prospection", Workspace, "/prospects", &[ManageProspects]),
        item("Partenaires", Workspace, "/partners", &[ManagePartners]),
        item("Événements", Workspace, "/activities", &[ManageActivities]),
        item("Billetterie", Workspace, "/tickets", &[ManageSalesTickets]),
        item("Mon Équipe", Workspace, "/team", &[ManageTeam]),
        item("Mon Profil", Workspace, "/profile", &[AccessUserProfile]),
        item("Dashboard Admin", Admin, "/admin/dashboard", &[AdminViewDashboard]),
        item(
            "Gestion Utilisateurs",
            Admin,
            "/admin/team-management",
            &[ManageUsers],
        ),
        item(
            "Gestion Événements",
            Admin,
            "/admin/events-management",
            &[ManagePlatformEvents],
        ),
        item(
            "Annonces Internes",
            Admin,
            "/admin/announcements",
            &[ManageInternalAnnouncements],
        ),
        item(
            "Gestion Prospects",
            Admin,
            "/admin/prospects-management",
            &[AdminManageProspects],
        ),
        item(
            "Marketing & Campagnes",
            Admin,
            "/admin/marketing",
            &[ManageMarketingCampaigns],
        ),
        item(
            "Générateur Propositions",
            Admin,
            "/admin/proposals",
            &[GenerateProposals],
        ),
        item("Rapports & Exports", Admin, "/admin/reports", &[ExportData]),
        item(
            "Suivi Activité Équipe",
            Admin,
            "/admin/team-activity",
            &[ViewTeamActivity],
        ),
        item(
            "Paramètres Globaux",
            Admin,
            "/admin/settings",
            &[ManageGlobalSettings],
        ),
    ]
}

/// Returns the page an identity lands on after sign-in.
///
/// Falls back to the shared dashboard when the role dashboard is not
/// reachable, and to the login page when anonymous.
#[must_use]
pub fn landing_path(identity: &Identity) -> &'static str {
    let Some(role) = identity.role() else {
        return LOGIN_PATH;
    };

    let preferred = match role {
        Role::Admin => "/admin/dashboard",
        Role::Prospecteur => "/dashboard/prospecteur",
        Role::Partenaire => "/dashboard/partenaire",
        Role::Billetterie => "/dashboard/billetterie",
        Role::Support => "/dashboard/support",
        Role::Manager | Role::Commercial | Role::Other(_) => "/dashboard",
    };

    match find_route(preferred) {
        Some(rule) if can_access_route(identity, &rule) => preferred,
        _ => "/dashboard",
    }
}
