//! Pass-through allow-list for raw CRM filter keys.
//!
//! Raw query keys that are not declared in a report's schema are forwarded to
//! the CRM only when they belong to its accepted filter vocabulary; everything
//! else is silently dropped before execution.

use once_cell::sync::Lazy;
use std::collections::HashSet;

static ALLOWED_FILTER_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "order[uuid]",
        "order[status]",
        "order[created-start]",
        "order[created-end]",
        "order[session-start]",
        "order[session-end]",
        "order[selection-start]",
        "order[selection-end]",
        "customer[id]",
        "customer[uuid]",
        "customer[name]",
        "customer[email]",
        "customer[whatsapp]",
        "customer[document]",
        "product[uuid]",
        "product[name]",
        "product[slug]",
        "product[reference]",
        "include",
        "fields",
    ]
    .into_iter()
    .collect()
});

/// Whether an undeclared raw key may pass through to the CRM.
pub fn is_allowed(key: &str) -> bool {
    ALLOWED_FILTER_KEYS.contains(key)
}
