//! Component kinds
//!
//! The thirteen configuration object kinds, declared in the order they are
//! reconciled. The derived `Ord` follows declaration order, so sorting a set of
//! kinds yields the sync order.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A kind of configuration object, in reconciliation priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    #[serde(rename = "keystore")]
    Keystore,
    #[serde(rename = "packages")]
    Package,
    #[serde(rename = "plugins")]
    Plugin,
    #[serde(rename = "assets")]
    Asset,
    #[serde(rename = "workspaces")]
    Workspace,
    #[serde(rename = "applets")]
    Applet,
    #[serde(rename = "applications")]
    Application,
    #[serde(rename = "tasks")]
    Task,
    #[serde(rename = "reports")]
    Report,
    #[serde(rename = "dashboards")]
    Dashboard,
    #[serde(rename = "users")]
    User,
    #[serde(rename = "groups")]
    Group,
    #[serde(rename = "roles")]
    Role,
}

impl ComponentKind {
    /// Every kind, in sync order
    pub const ALL: [ComponentKind; 13] = [
        Self::Keystore,
        Self::Package,
        Self::Plugin,
        Self::Asset,
        Self::Workspace,
        Self::Applet,
        Self::Application,
        Self::Task,
        Self::Report,
        Self::Dashboard,
        Self::User,
        Self::Group,
        Self::Role,
    ];

    /// Canonical collective name, used in filters, CLI flags and archive paths
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Keystore => "keystore",
            Self::Package => "packages",
            Self::Plugin => "plugins",
            Self::Asset => "assets",
            Self::Workspace => "workspaces",
            Self::Applet => "applets",
            Self::Application => "applications",
            Self::Task => "tasks",
            Self::Report => "reports",
            Self::Dashboard => "dashboards",
            Self::User => "users",
            Self::Group => "groups",
            Self::Role => "roles",
        }
    }

    /// Singular human-readable title, used in diff lines
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Keystore => "Keystore",
            Self::Package => "Package",
            Self::Plugin => "Plugin",
            Self::Asset => "Asset",
            Self::Workspace => "Workspace",
            Self::Applet => "Applet",
            Self::Application => "Application",
            Self::Task => "Task",
            Self::Report => "Report",
            Self::Dashboard => "Dashboard",
            Self::User => "User",
            Self::Group => "Group",
            Self::Role => "Role",
        }
    }

    /// Plural heading, used when grouping homework items
    #[must_use]
    pub const fn heading(&self) -> &'static str {
        match self {
            Self::Keystore => "Keystore",
            Self::Package => "Packages",
            Self::Plugin => "Plugins",
            Self::Asset => "Assets",
            Self::Workspace => "Workspaces",
            Self::Applet => "Applets",
            Self::Application => "Applications",
            Self::Task => "Tasks",
            Self::Report => "Reports",
            Self::Dashboard => "Dashboards",
            Self::User => "Users",
            Self::Group => "Groups",
            Self::Role => "Roles",
        }
    }

    /// Whether destination counterparts are matched by name rather than id
    #[must_use]
    pub const fn keyed_by_name(&self) -> bool {
        matches!(
            self,
            Self::Keystore | Self::Package | Self::Plugin | Self::User | Self::Group | Self::Role
        )
    }
}

impl Display for ComponentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| {
                kind.as_str() == needle || kind.title().eq_ignore_ascii_case(&needle)
            })
            .ok_or_else(|| DomainError::UnknownComponent(s.to_string()))
    }
}

/// Parse a comma-separated list of kinds, returning them in sync order
pub fn parse_kind_list(input: &str) -> Result<Vec<ComponentKind>, DomainError> {
    let mut kinds = input
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<ComponentKind>, _>>()?;
    kinds.sort();
    kinds.dedup();
    Ok(kinds)
}
