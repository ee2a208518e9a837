//! Homework items
//!
//! Manual follow-up actions the engine could not perform itself (keystore
//! values, user passwords, incompatible plugins, ...). Items are grouped by
//! component kind and printed at the end of every run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::kind::ComponentKind;

/// A single manual follow-up action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkItem {
    pub component_kind: ComponentKind,
    pub text: String,
}

/// Homework accumulated over a run, grouped by kind in sync order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkList {
    items: BTreeMap<ComponentKind, Vec<String>>,
}

impl HomeworkList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Exact duplicates for the same kind are ignored.
    pub fn add(&mut self, component_kind: ComponentKind, text: impl Into<String>) {
        let text = text.into();
        let bucket = self.items.entry(component_kind).or_default();
        if !bucket.contains(&text) {
            bucket.push(text);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.values().all(Vec::is_empty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// Items for one kind, in insertion order
    #[must_use]
    pub fn for_kind(&self, component_kind: ComponentKind) -> &[String] {
        self.items
            .get(&component_kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Flattened items, in kind order then insertion order
    pub fn iter(&self) -> impl Iterator<Item = HomeworkItem> + '_ {
        self.items.iter().flat_map(|(kind, texts)| {
            texts.iter().map(move |text| HomeworkItem {
                component_kind: *kind,
                text: text.clone(),
            })
        })
    }

    /// Printable summary, empty when there is nothing to do
    #[must_use]
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = String::from("HOMEWORK LIST:\n");
        for (kind, texts) in &self.items {
            if texts.is_empty() {
                continue;
            }
            out.push_str(kind.heading());
            out.push_str(":\n");
            for text in texts {
                out.push_str("\t- ");
                out.push_str(text);
                out.push('\n');
            }
        }
        out
    }
}
