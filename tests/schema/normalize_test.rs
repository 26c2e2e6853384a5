//! Normalization behavior against realistic report schemas.

#[path = "../common/mod.rs"]
mod common;

use common::raw_input;
use informe::query::{FetchMode, SortDirection, DEFAULT_PAGE, DEFAULT_PER_PAGE, MAX_PER_PAGE};
use informe::schema::{normalize, schema_of, ParamSpec};
use serde_json::json;

fn window_schema() -> informe::schema::ParamSchema {
    schema_of([
        ("from", ParamSpec::date().required()),
        ("to", ParamSpec::date().default_value("2026-08-30")),
        ("limit", ParamSpec::int()),
        ("rate", ParamSpec::float()),
        ("active", ParamSpec::bool()),
        ("tags", ParamSpec::string_array()),
    ])
}

#[test]
fn casts_each_declared_type() {
    let raw = raw_input(&[
        ("from", json!("2026-01-15")),
        ("limit", json!("25")),
        ("rate", json!("0.5")),
        ("active", json!("1")),
        ("tags", json!("a, b , ,c")),
    ]);
    let (query, errors) = normalize(&window_schema(), &raw);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(query.params["from"], json!("2026-01-15"));
    assert_eq!(query.params["to"], json!("2026-08-30"));
    assert_eq!(query.params["limit"], json!(25));
    assert_eq!(query.params["rate"], json!(0.5));
    assert_eq!(query.params["active"], json!(true));
    assert_eq!(query.params["tags"], json!(["a", "b", "c"]));
}

#[test]
fn casting_is_idempotent() {
    let raw = raw_input(&[
        ("from", json!("2026-01-15")),
        ("limit", json!("25")),
        ("rate", json!("1.5")),
        ("active", json!("yes")),
        ("tags", json!("x,y")),
    ]);
    let schema = window_schema();
    let (first, errors) = normalize(&schema, &raw);
    assert!(errors.is_empty());

    // Feed the already-normalized values back through.
    let again: serde_json::Map<String, serde_json::Value> =
        first.params.clone().into_iter().collect();
    let (second, errors) = normalize(&schema, &again);
    assert!(errors.is_empty());
    assert_eq!(first.params, second.params);
}

#[test]
fn missing_required_yields_single_field_error() {
    let raw = raw_input(&[("limit", json!(3))]);
    let (_, errors) = normalize(&window_schema(), &raw);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "from");
    assert_eq!(errors[0].message, "Parametro obrigatorio");
}

#[test]
fn empty_string_counts_as_absent() {
    let raw = raw_input(&[("from", json!("   "))]);
    let (_, errors) = normalize(&window_schema(), &raw);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "from");
}

#[test]
fn impossible_calendar_date_rejected() {
    let raw = raw_input(&[("from", json!("2024-02-30"))]);
    let (_, errors) = normalize(&window_schema(), &raw);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "from");
    assert_eq!(errors[0].message, "data invalida");
}

#[test]
fn multiple_errors_collected_in_one_pass() {
    let raw = raw_input(&[("limit", json!("abc")), ("rate", json!("xyz"))]);
    let (_, errors) = normalize(&window_schema(), &raw);
    let mut fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    fields.sort();
    assert_eq!(fields, vec!["from", "limit", "rate"]);
}

#[test]
fn allowed_filters_pass_through_unknown_keys_dropped() {
    let schema = schema_of([("from", ParamSpec::date())]);
    let raw = raw_input(&[
        ("order[status]", json!("payment_confirmed")),
        ("customer[email]", json!("  ana@example.com ")),
        ("include", json!("items,customer")),
        ("order[status]; DROP TABLE", json!("x")),
        ("internal_debug", json!("1")),
    ]);
    let (query, errors) = normalize(&schema, &raw);
    assert!(errors.is_empty());
    assert_eq!(query.params["order[status]"], json!("payment_confirmed"));
    assert_eq!(query.params["customer[email]"], json!("ana@example.com"));
    assert_eq!(query.params["include"], json!("items,customer"));
    assert!(!query.params.contains_key("order[status]; DROP TABLE"));
    assert!(!query.params.contains_key("internal_debug"));
}

#[test]
fn passthrough_arrays_keep_non_empty_strings_only() {
    let schema = schema_of([("from", ParamSpec::date())]);
    let raw = raw_input(&[("fields", json!(["uuid", "", "  name  ", 42]))]);
    let (query, _) = normalize(&schema, &raw);
    assert_eq!(query.params["fields"], json!(["uuid", "name", "42"]));
}

#[test]
fn control_keys_default_and_cap() {
    let schema = schema_of([("from", ParamSpec::date())]);

    let (query, _) = normalize(&schema, &raw_input(&[]));
    assert_eq!(query.page, DEFAULT_PAGE);
    assert_eq!(query.per_page, DEFAULT_PER_PAGE);
    assert_eq!(query.sort, None);
    assert_eq!(query.dir, SortDirection::Asc);
    assert!(query.cache_enabled);
    assert_eq!(query.cache_ttl_override, None);
    assert_eq!(query.fetch, FetchMode::Page);

    let raw = raw_input(&[
        ("page", json!("3")),
        ("per_page", json!(9999)),
        ("sort", json!(" created_at ")),
        ("dir", json!("DESC")),
        ("cache", json!("0")),
        ("cache_ttl", json!("-5")),
        ("fetch", json!("ALL")),
    ]);
    let (query, _) = normalize(&schema, &raw);
    assert_eq!(query.page, 3);
    assert_eq!(query.per_page, MAX_PER_PAGE);
    assert_eq!(query.sort.as_deref(), Some("created_at"));
    assert_eq!(query.dir, SortDirection::Desc);
    assert!(!query.cache_enabled);
    assert_eq!(query.cache_ttl_override, Some(0));
    assert_eq!(query.fetch, FetchMode::All);
}

#[test]
fn invalid_paging_falls_back_to_defaults() {
    let schema = schema_of([("from", ParamSpec::date())]);
    let raw = raw_input(&[("page", json!("zero")), ("per_page", json!(-3))]);
    let (query, _) = normalize(&schema, &raw);
    assert_eq!(query.page, DEFAULT_PAGE);
    assert_eq!(query.per_page, DEFAULT_PER_PAGE);
}

#[test]
fn control_keys_never_leak_into_params() {
    let schema = schema_of([("from", ParamSpec::date())]);
    let raw = raw_input(&[("page", json!(2)), ("dir", json!("desc")), ("cache", json!("0"))]);
    let (query, _) = normalize(&schema, &raw);
    assert!(query.params.is_empty());
}

#[test]
fn enum_allow_list_enforced_after_cast() {
    let schema = schema_of([(
        "status",
        ParamSpec::string().one_of(["payment_confirmed", "completed"]),
    )]);
    let (query, errors) = normalize(&schema, &raw_input(&[("status", json!("completed"))]));
    assert!(errors.is_empty());
    assert_eq!(query.params["status"], json!("completed"));

    let (_, errors) = normalize(&schema, &raw_input(&[("status", json!("refunded"))]));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "valor nao permitido");
}

#[test]
fn custom_date_format_respected() {
    let schema = schema_of([("from", ParamSpec::date().format("DD/MM/YYYY"))]);
    let (query, errors) = normalize(&schema, &raw_input(&[("from", json!("31/01/2026"))]));
    assert!(errors.is_empty());
    assert_eq!(query.params["from"], json!("31/01/2026"));

    let (_, errors) = normalize(&schema, &raw_input(&[("from", json!("2026-01-31"))]));
    assert_eq!(errors.len(), 1);
}
