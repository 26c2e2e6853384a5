//! Normalized query values shared across the engine.
//!
//! A [`NormalizedQuery`] is the output of schema normalization: every report
//! parameter typed and defaulted, plus the reserved control values (paging,
//! sort, cache flags, fetch mode) that are resolved independently of any
//! report's schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// First page when the caller does not ask for one.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size when the caller does not ask for one.
pub const DEFAULT_PER_PAGE: u32 = 50;
/// Hard cap on page size.
pub const MAX_PER_PAGE: u32 = 500;

/// Raw keys that are never treated as report parameters.
pub const CONTROL_KEYS: &[&str] = &[
    "page",
    "per_page",
    "sort",
    "dir",
    "cache",
    "cache_ttl",
    "fetch",
];

/// Sort direction for report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a raw `dir` value. Anything other than `desc` (case-insensitive)
    /// silently becomes ascending.
    pub fn parse(raw: Option<&Value>) -> Self {
        match raw {
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("desc") => Self::Desc,
            _ => Self::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Whether a run covers a single page or the complete result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Page,
    All,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::All => "all",
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// One structured validation error, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Fully typed, defaulted and validated query.
///
/// Control values are always present after normalization, even when the raw
/// input carried none of them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    /// Resolved report parameters plus passed-through external filters.
    pub params: BTreeMap<String, Value>,
    pub page: u32,
    pub per_page: u32,
    pub sort: Option<String>,
    pub dir: SortDirection,
    /// Disabled when the raw `cache` value is `0`/`false`.
    pub cache_enabled: bool,
    /// Numeric `cache_ttl` override, floored at zero.
    pub cache_ttl_override: Option<i64>,
    pub fetch: FetchMode,
}

impl Default for NormalizedQuery {
    fn default() -> Self {
        Self {
            params: BTreeMap::new(),
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort: None,
            dir: SortDirection::Asc,
            cache_enabled: true,
            cache_ttl_override: None,
            fetch: FetchMode::Page,
        }
    }
}
