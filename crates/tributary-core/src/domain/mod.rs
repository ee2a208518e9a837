//! Domain types
//!
//! This module contains the core bookkeeping types for a reconciliation run:
//! - Component kinds and their fixed sync order
//! - Opaque configuration objects
//! - Dry-run diff entries and homework items
//! - Inclusion/exclusion filters
//! - Tracking id correlation
//! - Version parsing and compatibility checks
//! - Domain-specific error types

pub mod diff;
pub mod errors;
pub mod filter;
pub mod homework;
pub mod kind;
pub mod newtypes;
pub mod object;
pub mod tracking;
pub mod version;

// Re-export commonly used types
pub use diff::{DiffEntry, DiffType};
pub use errors::DomainError;
pub use filter::{ComponentFilter, NameSets};
pub use homework::{HomeworkItem, HomeworkList};
pub use kind::ComponentKind;
pub use newtypes::{InstanceRole, RunId};
pub use object::ConfigObject;
pub use tracking::{TrackingIdMap, TrackingInsert};
pub use version::PlatformCompatibility;
