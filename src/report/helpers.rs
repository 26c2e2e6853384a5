//! Shared helper utility handed to report implementations.
//!
//! Collects the row-level transformations most reports need: sorting with
//! null/numeric awareness, indexing, summing, percentages, age calculation
//! and phone normalization.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::query::SortDirection;
use crate::report::Row;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D+").unwrap());

/// Stateless helper set, shared by every report execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Helpers;

impl Helpers {
    /// Sort rows in place by a field. Nulls order first ascending, last
    /// descending; numeric values compare numerically, strings
    /// case-insensitively.
    pub fn sort_rows(&self, rows: &mut [Row], field: Option<&str>, dir: SortDirection) {
        let Some(field) = field else {
            return;
        };
        rows.sort_by(|left, right| {
            let ordering = compare_values(left.get(field), right.get(field));
            match dir {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    /// Index rows by the string form of a field, skipping rows without it.
    pub fn index_by(&self, rows: &[Row], field: &str) -> BTreeMap<String, Row> {
        rows.iter()
            .filter_map(|row| {
                let key = value_text(row.get(field)?)?;
                if key.is_empty() {
                    return None;
                }
                Some((key, row.clone()))
            })
            .collect()
    }

    /// Sum the numeric values of a field across rows.
    pub fn sum_by(&self, rows: &[Row], field: &str) -> f64 {
        rows.iter()
            .filter_map(|row| row.get(field))
            .filter_map(Value::as_f64)
            .sum()
    }

    pub fn percent(&self, part: f64, total: f64) -> f64 {
        if total == 0.0 {
            0.0
        } else {
            (part / total) * 100.0
        }
    }

    /// Age in whole years for a `YYYY-MM-DD`-prefixed birthdate.
    pub fn age_in_years(&self, birthdate: &str) -> Option<i32> {
        let prefix = birthdate.trim().get(..10)?;
        let format = format_description!("[year]-[month]-[day]");
        let date = Date::parse(prefix, &format).ok()?;
        let today = OffsetDateTime::now_utc().date();
        let mut years = today.year() - date.year();
        if (today.month() as u8, today.day()) < (date.month() as u8, date.day()) {
            years -= 1;
        }
        Some(years)
    }

    /// Strip non-digits; keep at most the trailing 11 digits (DDD + number).
    pub fn sanitize_phone(&self, phone: &str) -> Option<String> {
        let digits = NON_DIGITS.replace_all(phone, "").into_owned();
        if digits.is_empty() {
            return None;
        }
        if digits.len() > 11 {
            Some(digits[digits.len() - 11..].to_string())
        } else {
            Some(digits)
        }
    }

    /// Last 8 digits of a phone, for fuzzy matching across sources.
    pub fn phone_suffix8(&self, phone: &str) -> Option<String> {
        let digits = NON_DIGITS.replace_all(phone, "").into_owned();
        if digits.is_empty() {
            return None;
        }
        if digits.len() > 8 {
            Some(digits[digits.len() - 8..].to_string())
        } else {
            Some(digits)
        }
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (normalize_null(left), normalize_null(right)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => {
            if let (Some(lf), Some(rf)) = (l.as_f64(), r.as_f64()) {
                lf.total_cmp(&rf)
            } else {
                let ls = value_text(l).unwrap_or_default().to_lowercase();
                let rs = value_text(r).unwrap_or_default().to_lowercase();
                ls.cmp(&rs)
            }
        }
    }
}

fn normalize_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
