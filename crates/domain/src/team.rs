use serde::Serialize;
use tinspace_core::{AppError, AppResult, UserId};

use crate::{
    Capability, CommissionEstimate, DEFAULT_COMMISSION_RATE, Role, estimate_commission,
    validate_commission_rate, validate_points,
};
use crate::commission::normalize_rate;

/// Raw team member fields as stored in account metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMemberInput {
    /// Account identifier.
    pub id: UserId,
    /// Account e-mail.
    pub email: String,
    /// Stored full name, if any.
    pub full_name: Option<String>,
    /// Stored role, if any.
    pub role: Option<Role>,
    /// Stored point total, if any.
    pub points: Option<i64>,
    /// Stored commission rate, if any.
    pub commission_rate: Option<f64>,
    /// Stored explicit capability list, if any.
    pub capabilities: Option<Vec<Capability>>,
}

impl TeamMemberInput {
    /// Builds the input of a new account from its requested profile.
    #[must_use]
    pub fn from_changes(id: UserId, email: impl Into<String>, profile: &TeamMemberChanges) -> Self {
        Self {
            id,
            email: email.into(),
            full_name: profile.full_name.clone(),
            role: profile.role.clone(),
            points: profile.points,
            commission_rate: profile.commission_rate,
            capabilities: profile.capabilities.clone(),
        }
    }
}

/// Team member as read for commission and directory purposes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMember {
    id: UserId,
    display_name: String,
    email: String,
    role: Role,
    points: i64,
    commission_rate: f64,
    capabilities: Option<Vec<Capability>>,
}

impl TeamMember {
    /// Builds a team member, applying the product defaults for missing
    /// metadata and validating points and rate.
    pub fn new(input: TeamMemberInput) -> AppResult<Self> {
        let points = input.points.unwrap_or(0);
        let commission_rate =
            normalize_rate(input.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE));
        validate_points(points)?;
        validate_commission_rate(commission_rate)?;

        let email = input.email.trim().to_owned();
        let display_name = input
            .full_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_owned)
            })
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "team member '{}' has neither a name nor an e-mail",
                    input.id
                ))
            })?;

        Ok(Self {
            id: input.id,
            display_name,
            email,
            role: input.role.unwrap_or(Role::Commercial),
            points,
            commission_rate,
            capabilities: input.capabilities,
        })
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the e-mail.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns the point total.
    #[must_use]
    pub fn points(&self) -> i64 {
        self.points
    }

    /// Returns the personal commission rate.
    #[must_use]
    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    /// Returns the stored explicit capability list, if any.
    #[must_use]
    pub fn capabilities(&self) -> Option<&[Capability]> {
        self.capabilities.as_deref()
    }

    /// Returns the commission estimate for the current point total.
    pub fn estimated_commission(&self) -> AppResult<CommissionEstimate> {
        estimate_commission(self.points, self.commission_rate)
    }

    /// Returns a copy of the member with the changes applied and validated.
    pub fn with_changes(&self, changes: &TeamMemberChanges) -> AppResult<Self> {
        Self::new(TeamMemberInput {
            id: self.id,
            email: self.email.clone(),
            full_name: Some(
                changes
                    .full_name
                    .clone()
                    .unwrap_or_else(|| self.display_name.clone()),
            ),
            role: Some(changes.role.clone().unwrap_or_else(|| self.role.clone())),
            points: Some(changes.points.unwrap_or(self.points)),
            commission_rate: Some(changes.commission_rate.unwrap_or(self.commission_rate)),
            capabilities: changes
                .capabilities
                .clone()
                .or_else(|| self.capabilities.clone()),
        })
    }
}

/// Administrative changes to a team member. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamMemberChanges {
    /// New full name.
    pub full_name: Option<String>,
    /// New role.
    pub role: Option<Role>,
    /// New point total.
    pub points: Option<i64>,
    /// New commission rate.
    pub commission_rate: Option<f64>,
    /// New explicit capability list.
    pub capabilities: Option<Vec<Capability>>,
}

/// Directory filter: free-text search on name or e-mail plus optional role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamFilter {
    /// Case-insensitive substring matched against name and e-mail.
    pub search: Option<String>,
    /// Exact role to keep.
    pub role: Option<Role>,
}

impl TeamFilter {
    /// Returns whether the member passes the filter.
    #[must_use]
    pub fn matches(&self, member: &TeamMember) -> bool {
        let matches_role = self.role.as_ref().is_none_or(|role| member.role() == role);

        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                member.display_name().to_lowercase().contains(term.as_str())
                    || member.email().to_lowercase().contains(term.as_str())
            }
        };

        matches_role && matches_search
    }
}
