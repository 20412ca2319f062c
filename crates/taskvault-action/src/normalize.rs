//! Argument-name normalization for external operations.
//!
//! Generators drift in vocabulary (`customer` vs `client_name`). A fixed
//! synonym table maps the common variants onto canonical names. A synonym is
//! only renamed when the canonical key is absent, so an explicit value is
//! never overwritten. Matching is exact; no fuzzy matching is attempted.

use tracing::debug;

use crate::types::ArgumentMap;

/// `(synonym, canonical)` pairs, applied in order.
pub const SYNONYMS: &[(&str, &str)] = &[
    ("customer", "client_name"),
    ("partner_name", "client_name"),
    ("client", "client_name"),
    ("company", "client_name"),
    ("cost", "amount"),
    ("price", "amount"),
    ("total", "amount"),
    ("value", "amount"),
    ("desc", "description"),
    ("details", "description"),
    ("note", "description"),
    ("memo", "description"),
];

pub fn normalize_arguments(arguments: &ArgumentMap) -> ArgumentMap {
    let mut mapped = arguments.clone();
    for (synonym, canonical) in SYNONYMS {
        if mapped.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = mapped.remove(*synonym) {
            mapped.insert((*canonical).to_string(), value);
        }
    }
    if &mapped != arguments {
        debug!(before = ?arguments.keys().collect::<Vec<_>>(), after = ?mapped.keys().collect::<Vec<_>>(), "Argument names normalized");
    }
    mapped
}
