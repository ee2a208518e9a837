//! Inclusion and exclusion filters
//!
//! A run may restrict which objects it touches, either by naming the only
//! objects to include or by naming objects to exclude. Filters are keyed by
//! component kind; an include filter restricts only the kinds it names.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::kind::ComponentKind;

/// Names that are never reconciled, regardless of filters
pub const BUILTIN_EXCLUSIONS: &[(ComponentKind, &str)] = &[
    (ComponentKind::Group, "Everyone"),
    (ComponentKind::Role, "Administrator"),
];

/// Names per kind
pub type NameSets = BTreeMap<ComponentKind, BTreeSet<String>>;

/// Per-run object filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "names")]
pub enum ComponentFilter {
    /// Everything except the built-in exclusions
    #[default]
    All,
    /// Only the named objects, for the kinds present in the map
    Include(NameSets),
    /// Everything except the named objects
    Exclude(NameSets),
}

impl ComponentFilter {
    /// Build a filter from optional include and exclude maps.
    ///
    /// Supplying both is a usage error. Empty maps count as absent.
    pub fn new(include: Option<NameSets>, exclude: Option<NameSets>) -> Result<Self, DomainError> {
        let include = include.filter(|m| !m.is_empty());
        let exclude = exclude.filter(|m| !m.is_empty());
        match (include, exclude) {
            (Some(_), Some(_)) => Err(DomainError::ConflictingFilters),
            (Some(inc), None) => Ok(Self::Include(inc)),
            (None, Some(exc)) => Ok(Self::Exclude(exc)),
            (None, None) => Ok(Self::All),
        }
    }

    /// Build from `kind=name` expressions, as given on the command line
    pub fn from_expressions(include: &[String], exclude: &[String]) -> Result<Self, DomainError> {
        let include = parse_expressions(include)?;
        let exclude = parse_expressions(exclude)?;
        Self::new(Some(include), Some(exclude))
    }

    /// Whether the object named `name` of `kind` may be reconciled
    #[must_use]
    pub fn allows(&self, kind: ComponentKind, name: &str) -> bool {
        if is_builtin(kind, name) {
            return false;
        }
        match self {
            Self::All => true,
            Self::Include(sets) => sets.get(&kind).map_or(true, |names| names.contains(name)),
            Self::Exclude(sets) => sets.get(&kind).map_or(true, |names| !names.contains(name)),
        }
    }
}

/// Whether `name` is one of the always-excluded built-in objects
#[must_use]
pub fn is_builtin(kind: ComponentKind, name: &str) -> bool {
    BUILTIN_EXCLUSIONS
        .iter()
        .any(|(k, n)| *k == kind && *n == name)
}

/// Parse `kind=name` expressions into a name map
pub fn parse_expressions(expressions: &[String]) -> Result<NameSets, DomainError> {
    let mut sets = NameSets::new();
    for expr in expressions {
        let (kind, name) = expr
            .split_once('=')
            .filter(|(_, name)| !name.trim().is_empty())
            .ok_or_else(|| DomainError::InvalidFilter(expr.clone()))?;
        let kind: ComponentKind = kind.parse()?;
        sets.entry(kind).or_default().insert(name.trim().to_string());
    }
    Ok(sets)
}
