//! Tracking id correlation
//!
//! Each application owns an auto-generated tracking field whose id differs
//! between instances. Reference fields in other applications and task mappings
//! point at those ids, so they must be translated after the referenced
//! application exists on the destination.

use std::collections::HashMap;

/// Outcome of inserting a correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingInsert {
    /// New key recorded
    Inserted,
    /// Key already mapped to the same destination id
    Unchanged,
    /// Key already mapped to a different destination id; the first value is kept
    Conflict { existing: String },
}

/// Source tracking id to destination tracking id, write-once per key
#[derive(Debug, Clone, Default)]
pub struct TrackingIdMap {
    entries: HashMap<String, String>,
}

impl TrackingIdMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a correlation. A key is never overwritten.
    pub fn insert(&mut self, source_id: impl Into<String>, destination_id: impl Into<String>) -> TrackingInsert {
        let source_id = source_id.into();
        let destination_id = destination_id.into();
        match self.entries.get(&source_id) {
            Some(existing) if *existing == destination_id => TrackingInsert::Unchanged,
            Some(existing) => TrackingInsert::Conflict {
                existing: existing.clone(),
            },
            None => {
                self.entries.insert(source_id, destination_id);
                TrackingInsert::Inserted
            }
        }
    }

    #[must_use]
    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.entries.get(source_id).map(String::as_str)
    }

    /// Translate an id, returning the input unchanged when it is not mapped
    #[must_use]
    pub fn translate<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).unwrap_or(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
