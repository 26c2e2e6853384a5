//! Paid orders that still have no session scheduled.
//!
//! Closure-based report. Pulls confirmed orders from the CRM inside the
//! requested creation window and keeps the ones where both schedule slots are
//! empty.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::provider::ProviderResult;
use crate::registry::ReportDefinition;
use crate::report::{ColumnSpec, ColumnType, ReportParams, ReportResult, Row, RunnerCtx};
use crate::schema::{schema_of, ParamSpec};

use super::{days_ago, fetch_rows, field_str, today};

pub const KEY: &str = "orders.missing_schedule";

pub fn definition() -> ReportDefinition {
    ReportDefinition::closure(KEY, |ctx, params| Box::pin(run(ctx, params)))
        .title("Pedidos com pagamento confirmado e sem agendamento")
        .description("Pedidos pagos dentro do periodo que ainda nao possuem nenhuma sessao agendada")
        .columns(vec![
            ColumnSpec::new("uuid").label("Pedido"),
            ColumnSpec::new("customer_name").label("Cliente"),
            ColumnSpec::new("customer_whatsapp").label("WhatsApp"),
            ColumnSpec::new("product").label("Produto"),
            ColumnSpec::new("created_at").label("Criado em").kind(ColumnType::Date),
        ])
        .params(schema_of([
            ("from", ParamSpec::date().deferred_default(|| days_ago(90))),
            ("to", ParamSpec::date().deferred_default(today)),
            (
                "status",
                ParamSpec::string()
                    .default_value("payment_confirmed")
                    .one_of(["payment_confirmed", "completed"]),
            ),
        ]))
        .cache_ttl(900)
}

async fn run(ctx: RunnerCtx<'_>, params: &ReportParams) -> ProviderResult<ReportResult> {
    let query = crm_query(params);
    let orders = fetch_rows(ctx.crm, params, &query).await?;

    let total_checked = orders.len();
    let mut rows: Vec<Row> = orders
        .iter()
        .filter(|order| is_unscheduled(order))
        .map(|order| shape(order, ctx))
        .collect();

    ctx.helpers
        .sort_rows(&mut rows, params.sort.as_deref(), params.dir);

    let mut result = ReportResult {
        data: rows,
        ..Default::default()
    };
    result
        .summary
        .insert("missing_schedule".into(), Value::from(result.data.len()));
    result
        .summary
        .insert("total_orders_checked".into(), Value::from(total_checked));
    Ok(result)
}

/// Translate engine parameters into the CRM's filter naming.
fn crm_query(params: &ReportParams) -> BTreeMap<String, Value> {
    let mut query = params.crm_query();
    if let Some(from) = query.remove("from") {
        query.insert("order[created-start]".into(), from);
    }
    if let Some(to) = query.remove("to") {
        query.insert("order[created-end]".into(), to);
    }
    if let Some(status) = query.remove("status") {
        query.insert("order[status]".into(), status);
    }
    query
        .entry("include".into())
        .or_insert_with(|| Value::String("items,customer".into()));
    query
}

fn is_unscheduled(order: &Row) -> bool {
    slot_empty(order.get("schedule_1")) && slot_empty(order.get("schedule_2"))
}

fn slot_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn shape(order: &Row, ctx: RunnerCtx<'_>) -> Row {
    let mut row = Row::new();
    row.insert(
        "uuid".into(),
        order.get("uuid").cloned().unwrap_or(Value::Null),
    );
    row.insert(
        "customer_name".into(),
        field_str(order, &["customer", "name"])
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    row.insert(
        "customer_whatsapp".into(),
        field_str(order, &["customer", "whatsapp"])
            .and_then(|phone| ctx.helpers.sanitize_phone(&phone))
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    row.insert(
        "product".into(),
        first_product_name(order).map(Value::String).unwrap_or(Value::Null),
    );
    row.insert(
        "created_at".into(),
        order.get("created_at").cloned().unwrap_or(Value::Null),
    );
    row
}

fn first_product_name(order: &Row) -> Option<String> {
    order
        .get("items")?
        .as_array()?
        .first()?
        .get("product")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
