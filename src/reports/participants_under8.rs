//! Participants younger than eight years across recent orders.
//!
//! Class-based report. Walks order participants inside the requested window,
//! computes ages from birthdates, and keeps children under eight. The summary
//! carries the under-8 count, total participants checked, and the share as a
//! percentage.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::provider::ProviderResult;
use crate::registry::ReportDefinition;
use crate::report::{
    ColumnSpec, ColumnType, Report, ReportParams, ReportResult, Row, RunnerCtx,
};
use crate::schema::{schema_of, ParamSchema, ParamSpec};

use super::{days_ago, fetch_rows, field_str, today};

pub const KEY: &str = "participants.under_8";

const AGE_LIMIT: i32 = 8;

pub fn definition() -> ReportDefinition {
    ReportDefinition::class(KEY, || Arc::new(ParticipantsUnder8))
}

pub struct ParticipantsUnder8;

#[async_trait]
impl Report for ParticipantsUnder8 {
    fn title(&self) -> &str {
        "Participantes com menos de 8 anos"
    }

    fn description(&self) -> &str {
        "Participantes de pedidos no periodo cuja idade calculada e inferior a 8 anos"
    }

    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("order_uuid").label("Pedido"),
            ColumnSpec::new("customer_name").label("Cliente"),
            ColumnSpec::new("participant_name").label("Participante"),
            ColumnSpec::new("birthdate").label("Nascimento").kind(ColumnType::Date),
            ColumnSpec::new("age").label("Idade").kind(ColumnType::Int),
            ColumnSpec::new("product").label("Produto"),
            ColumnSpec::new("created_at").label("Criado em").kind(ColumnType::Date),
        ]
    }

    fn params(&self) -> ParamSchema {
        schema_of([
            ("from", ParamSpec::date().deferred_default(|| days_ago(365))),
            ("to", ParamSpec::date().deferred_default(today)),
        ])
    }

    fn cache_ttl(&self) -> Option<u64> {
        Some(1200)
    }

    async fn run(&self, ctx: RunnerCtx<'_>, params: &ReportParams) -> ProviderResult<ReportResult> {
        let query = crm_query(params);
        let orders = fetch_rows(ctx.crm, params, &query).await?;

        let mut checked = 0usize;
        let mut rows: Vec<Row> = Vec::new();
        for order in &orders {
            for participant in participants(order) {
                checked += 1;
                let Some(birthdate) = participant.get("birthdate").and_then(Value::as_str) else {
                    continue;
                };
                let Some(age) = ctx.helpers.age_in_years(birthdate) else {
                    continue;
                };
                if age < AGE_LIMIT {
                    rows.push(shape(order, participant, age));
                }
            }
        }

        ctx.helpers
            .sort_rows(&mut rows, params.sort.as_deref(), params.dir);

        let under_8 = rows.len();
        let mut result = ReportResult {
            data: rows,
            ..Default::default()
        };
        result.summary.insert("under_8".into(), Value::from(under_8));
        result
            .summary
            .insert("total_participants_checked".into(), Value::from(checked));
        result.summary.insert(
            "percent_under_8".into(),
            Value::from(ctx.helpers.percent(under_8 as f64, checked as f64)),
        );
        Ok(result)
    }
}

fn crm_query(params: &ReportParams) -> BTreeMap<String, Value> {
    let mut query = params.crm_query();
    if let Some(from) = query.remove("from") {
        query.insert("order[created-start]".into(), from);
    }
    if let Some(to) = query.remove("to") {
        query.insert("order[created-end]".into(), to);
    }
    query
        .entry("include".into())
        .or_insert_with(|| Value::String("items,customer,participants".into()));
    query
}

fn participants(order: &Row) -> impl Iterator<Item = &Row> {
    order
        .get("participants")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object))
        .into_iter()
        .flatten()
}

fn shape(order: &Row, participant: &Row, age: i32) -> Row {
    let mut row = Row::new();
    row.insert(
        "order_uuid".into(),
        order.get("uuid").cloned().unwrap_or(Value::Null),
    );
    row.insert(
        "customer_name".into(),
        field_str(order, &["customer", "name"])
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    row.insert(
        "participant_name".into(),
        participant.get("name").cloned().unwrap_or(Value::Null),
    );
    row.insert(
        "birthdate".into(),
        participant.get("birthdate").cloned().unwrap_or(Value::Null),
    );
    row.insert("age".into(), Value::from(age));
    row.insert("product".into(), first_product_name(order));
    row.insert(
        "created_at".into(),
        order.get("created_at").cloned().unwrap_or(Value::Null),
    );
    row
}

fn first_product_name(order: &Row) -> Value {
    order
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("product"))
        .and_then(|product| product.get("name"))
        .cloned()
        .unwrap_or(Value::Null)
}
