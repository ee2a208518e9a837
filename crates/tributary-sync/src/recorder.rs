//! Dry-run diff recorder
//!
//! Under dry-run every mutating reconciler branch records a [`DiffEntry`]
//! here instead of calling the destination. The rendered entries are the
//! complete result of a dry run.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;
use tributary_core::domain::{ComponentKind, DiffEntry, DiffType, DomainError};

/// Ordered list of the changes a real run would have made
#[derive(Debug, Default)]
pub struct DiffRecorder {
    entries: Mutex<Vec<DiffEntry>>,
}

impl DiffRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, entry: DiffEntry) {
        info!(diff = %entry, "Dry run");
        self.lock().push(entry);
    }

    /// Append an entry whose diff type arrives as text.
    ///
    /// Anything outside the five known diff types is a usage error.
    pub fn record_raw(
        &self,
        component_kind: ComponentKind,
        name: &str,
        diff_type: &str,
        subcomponent: Option<&str>,
        value: Option<&str>,
    ) -> Result<(), DomainError> {
        let diff_type: DiffType = diff_type.parse()?;
        let mut entry = DiffEntry::new(component_kind, name, diff_type);
        if let Some(sub) = subcomponent {
            entry = entry.with_subcomponent(sub, value.map(str::to_string));
        }
        self.record(entry);
        Ok(())
    }

    /// Snapshot of every entry, in recording order
    pub fn entries(&self) -> Vec<DiffEntry> {
        self.lock().clone()
    }

    /// Every entry rendered with the fixed template
    pub fn render(&self) -> Vec<String> {
        self.lock().iter().map(DiffEntry::render).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DiffEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
