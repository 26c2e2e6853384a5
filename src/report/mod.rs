//! Report results, execution parameters, and the two execution strategies.
//!
//! A report is either *class-based* (a type implementing [`Report`]) or
//! *closure-based* (a [`Runner`] function registered alongside its metadata).
//! Both receive the same typed [`ReportParams`] and the same collaborator
//! context, and both produce a [`ReportResult`].

mod helpers;
pub use helpers::Helpers;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::provider::{CrmFetcher, DbExecutor, ProviderResult};
use crate::query::{FetchMode, SortDirection};
use crate::schema::ParamSchema;

/// One output row: column key to value.
pub type Row = serde_json::Map<String, Value>;

/// Column value types, used by clients for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Date,
    Json,
}

/// Output column description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub key: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: ColumnType,
}

impl ColumnSpec {
    /// Column with its key doubling as the label.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            kind: ColumnType::String,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn kind(mut self, kind: ColumnType) -> Self {
        self.kind = kind;
        self
    }
}

/// Output of one report execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportResult {
    pub data: Vec<Row>,
    /// Report-specific aggregates.
    pub summary: serde_json::Map<String, Value>,
    /// Enriched by the engine with paging, cache and timing details.
    pub meta: serde_json::Map<String, Value>,
    pub columns: Vec<ColumnSpec>,
}

impl ReportResult {
    pub fn new(
        data: Vec<Row>,
        summary: serde_json::Map<String, Value>,
        meta: serde_json::Map<String, Value>,
        columns: Vec<ColumnSpec>,
    ) -> Self {
        Self {
            data,
            summary,
            meta,
            columns,
        }
    }

    /// Columns inferred from the first data row, for reports that declare
    /// none.
    pub fn inferred_columns(&self) -> Vec<ColumnSpec> {
        self.data
            .first()
            .map(|row| row.keys().map(ColumnSpec::new).collect())
            .unwrap_or_default()
    }
}

/// Typed parameter map handed to the execution strategy.
#[derive(Debug, Clone)]
pub struct ReportParams {
    /// Resolved schema parameters plus passed-through CRM filters.
    pub values: BTreeMap<String, Value>,
    pub trace_id: String,
    pub page: u32,
    pub per_page: u32,
    pub sort: Option<String>,
    pub dir: SortDirection,
    pub fetch: FetchMode,
}

impl ReportParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn fetch_all(&self) -> bool {
        self.fetch.is_all()
    }

    /// Query map for a CRM call: parameters plus paging and sort values.
    pub fn crm_query(&self) -> BTreeMap<String, Value> {
        let mut query = self.values.clone();
        query.insert("page".into(), Value::from(self.page));
        query.insert("per_page".into(), Value::from(self.per_page));
        if let Some(sort) = &self.sort {
            query.insert("sort".into(), Value::String(sort.clone()));
            query.insert("dir".into(), Value::String(self.dir.as_str().to_string()));
        }
        query
    }
}

/// Collaborators available to an executing report.
#[derive(Clone, Copy)]
pub struct RunnerCtx<'a> {
    pub crm: &'a dyn CrmFetcher,
    pub db: &'a dyn DbExecutor,
    pub helpers: &'a Helpers,
}

/// Future returned by a closure runner.
pub type RunnerFuture<'a> = BoxFuture<'a, ProviderResult<ReportResult>>;

/// Closure execution strategy: a registered runner function.
pub type Runner =
    dyn for<'a> Fn(RunnerCtx<'a>, &'a ReportParams) -> RunnerFuture<'a> + Send + Sync;

/// Class execution strategy: a report object owning its own metadata.
#[async_trait]
pub trait Report: Send + Sync {
    fn title(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn columns(&self) -> Vec<ColumnSpec>;

    fn params(&self) -> ParamSchema;

    /// Report-declared cache TTL; `None` falls back to the engine default.
    fn cache_ttl(&self) -> Option<u64> {
        None
    }

    async fn run(&self, ctx: RunnerCtx<'_>, params: &ReportParams) -> ProviderResult<ReportResult>;
}
