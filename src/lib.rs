//! informe: a parameterized reporting engine.
//!
//! Reports are registered once with a typed parameter schema, then executed
//! through a single pipeline that validates input, negotiates caching, runs
//! one of two execution strategies, and enriches the result with uniform
//! metadata. Finished results can be streamed out as csv, json or ndjson in
//! caller-sized chunks.
//!
//! ```text
//!                     +-----------------------+
//!   raw request ----> |  schema::normalize    | --field errors--> reject
//!                     +-----------------------+
//!                                |
//!                                v
//!                     +-----------------------+     hit
//!                     |  cache::Coordinator   | ----------> cached result
//!                     +-----------------------+
//!                                | miss
//!                                v
//!                     +-----------------------+
//!                     |  registry strategy    |  class-based | closure-based
//!                     +-----------------------+
//!                                |
//!                                v
//!                     +-----------------------+
//!                     |  engine meta binding  | ---> result / ExportStream
//!                     +-----------------------+
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use informe::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(crm: Arc<dyn CrmFetcher>, db: Arc<dyn DbExecutor>) -> Result<(), EngineError> {
//! let registry = informe::reports::builtin_registry()
//!     .map_err(EngineError::from)?;
//! let engine = ReportEngine::new(registry, crm, db)
//!     .with_cache_store(Arc::new(MemoryCacheStore::new()));
//!
//! let mut raw = serde_json::Map::new();
//! raw.insert("from".into(), "2026-06-01".into());
//! let result = engine.run("orders.missing_schedule", &raw, "").await?;
//! println!("{} rows", result.data.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod export;
pub mod provider;
pub mod query;
pub mod registry;
pub mod report;
pub mod reports;
pub mod schema;

/// Common imports for embedders.
pub mod prelude {
    pub use crate::cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
    pub use crate::config::Settings;
    pub use crate::engine::{EngineError, ReportEngine};
    pub use crate::export::{ExportFormat, ExportStream};
    pub use crate::provider::{CrmFetcher, CrmResponse, DbExecutor, ProviderError};
    pub use crate::query::{FieldError, NormalizedQuery, SortDirection};
    pub use crate::registry::{ExecutionStrategy, ReportDefinition, ReportRegistry};
    pub use crate::report::{
        ColumnSpec, ColumnType, Helpers, Report, ReportParams, ReportResult, Row, RunnerCtx,
    };
    pub use crate::schema::{schema_of, ParamSchema, ParamSpec};
}
