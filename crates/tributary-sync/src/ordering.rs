//! Reference order resolver
//!
//! Applications are the only kind that reference their own kind. Before the
//! applications pass, the source applications are ordered by descending count
//! of outbound reference fields, so heavily referencing applications go
//! first. Ties keep discovery order.
//!
//! This is a heuristic rather than a topological sort: an equal-count forward
//! reference or a cycle can place a referencing application before its
//! referent. The tracking-id rewrite pass that follows the applications pass
//! repairs correlation ids regardless of the order chosen here.

use serde_json::Value;
use tributary_core::domain::ConfigObject;

/// `$type` marker carried by reference fields
const REFERENCE_FIELD_TYPE: &str = "ReferenceField";

/// Whether an application field points at another application
pub fn is_reference_field(field: &Value) -> bool {
    let by_field_type = field
        .get("fieldType")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("reference"));
    let by_discriminator = field
        .get("$type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.contains(REFERENCE_FIELD_TYPE));
    by_field_type || by_discriminator
}

/// Ids of the applications `application` references, in field order
pub fn reference_targets(application: &ConfigObject) -> Vec<String> {
    application
        .array("fields")
        .iter()
        .filter(|field| is_reference_field(field))
        .filter_map(|field| field.get("targetId").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Order applications by descending reference count.
///
/// Returns `(id, referenced ids)` pairs. Applications without an id are
/// skipped; a repeated id keeps its first occurrence.
pub fn reference_order(applications: &[ConfigObject]) -> Vec<(String, Vec<String>)> {
    let mut order: Vec<(String, Vec<String>)> = Vec::with_capacity(applications.len());
    for application in applications {
        let Some(id) = application.id() else {
            continue;
        };
        if order.iter().any(|(seen, _)| seen == id) {
            continue;
        }
        order.push((id.to_string(), reference_targets(application)));
    }
    // sort_by is stable: equal counts keep discovery order
    order.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()));
    order
}
