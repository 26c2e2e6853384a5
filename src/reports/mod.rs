//! Built-in report catalog.
//!
//! One module per report. `builtin_registry` wires them all into a fresh
//! registry; embedders with their own catalog can call each module's
//! `definition` directly.

pub mod missing_schedule;
pub mod participants_under8;

use serde_json::Value;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::provider::{CrmFetcher, ProviderResult};
use crate::registry::{RegistryError, ReportRegistry};
use crate::report::{ReportParams, Row};

/// Registry pre-loaded with every built-in report.
pub fn builtin_registry() -> Result<ReportRegistry, RegistryError> {
    let mut registry = ReportRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}

/// Add the built-in reports to an existing registry.
pub fn register_builtin(registry: &mut ReportRegistry) -> Result<(), RegistryError> {
    registry.register(missing_schedule::definition())?;
    registry.register(participants_under8::definition())?;
    Ok(())
}

/// Today's date as `YYYY-MM-DD`, for deferred parameter defaults.
pub(crate) fn today() -> Value {
    date_value(OffsetDateTime::now_utc().date())
}

/// The date `days` days before today, as `YYYY-MM-DD`.
pub(crate) fn days_ago(days: i64) -> Value {
    date_value(OffsetDateTime::now_utc().date() - Duration::days(days))
}

fn date_value(date: time::Date) -> Value {
    let format = format_description!("[year]-[month]-[day]");
    match date.format(&format) {
        Ok(formatted) => Value::String(formatted),
        Err(_) => Value::Null,
    }
}

/// Fetch CRM rows for the given query: one page, or every page when the
/// params request the full result set. Follows `links.next` with a hard page
/// limit so a misbehaving CRM cannot loop us forever.
pub(crate) async fn fetch_rows(
    crm: &dyn CrmFetcher,
    params: &ReportParams,
    query: &std::collections::BTreeMap<String, Value>,
) -> ProviderResult<Vec<Row>> {
    const MAX_PAGES: u32 = 1000;

    let mut query = query.clone();
    let mut rows = Vec::new();
    let mut page = params.page;

    loop {
        query.insert("page".into(), Value::from(page));
        let response = crm.fetch(&query, &params.trace_id).await?;
        rows.extend(response.data());
        if !params.fetch_all() || response.next_link().is_none() {
            break;
        }
        page += 1;
        if page > params.page + MAX_PAGES {
            break;
        }
    }

    Ok(rows)
}

/// Nested string lookup: `field(row, &["customer", "name"])`.
pub(crate) fn field<'a>(row: &'a Row, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = row.get(*first)?;
    for key in rest {
        current = current.get(key)?;
    }
    Some(current)
}

pub(crate) fn field_str(row: &Row, path: &[&str]) -> Option<String> {
    field(row, path).and_then(Value::as_str).map(str::to_string)
}
