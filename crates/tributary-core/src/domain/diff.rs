//! Dry-run diff entries
//!
//! A [`DiffEntry`] describes one change a real run would have made. Entries are
//! produced only in dry-run mode and rendered with a fixed template.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::kind::ComponentKind;

/// The kind of change a dry run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    Added,
    Updated,
    Upgraded,
    Removed,
    Moved,
}

impl DiffType {
    /// All diff types
    pub const ALL: [DiffType; 5] = [
        Self::Added,
        Self::Updated,
        Self::Upgraded,
        Self::Removed,
        Self::Moved,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Upgraded => "upgraded",
            Self::Removed => "removed",
            Self::Moved => "moved",
        }
    }

    /// Whether a real run would issue a write for this change
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Added | Self::Updated | Self::Upgraded)
    }
}

impl Display for DiffType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::InvalidDiffType(s.to_string()))
    }
}

/// One change a real run would have made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub component_kind: ComponentKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcomponent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub diff_type: DiffType,
}

impl DiffEntry {
    #[must_use]
    pub fn new(component_kind: ComponentKind, name: impl Into<String>, diff_type: DiffType) -> Self {
        Self {
            component_kind,
            name: name.into(),
            subcomponent: None,
            value: None,
            diff_type,
        }
    }

    /// Attach a subcomponent (e.g. `field`, `workflow`) and its value
    #[must_use]
    pub fn with_subcomponent(mut self, subcomponent: impl Into<String>, value: Option<String>) -> Self {
        self.subcomponent = Some(subcomponent.into());
        self.value = value;
        self
    }

    /// Human-readable line for the dry-run report
    #[must_use]
    pub fn render(&self) -> String {
        let kind = self.component_kind.title();
        match (&self.subcomponent, self.value.as_deref()) {
            (Some(sub), Some(value)) if !value.is_empty() => format!(
                "{kind} '{}' {sub} '{value}' would have been {}.",
                self.name, self.diff_type
            ),
            (Some(sub), _) => format!(
                "{kind} '{}' {sub} would have been {}.",
                self.name, self.diff_type
            ),
            (None, _) => format!("{kind} '{}' would have been {}.", self.name, self.diff_type),
        }
    }
}

impl Display for DiffEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
