//! Report execution pipeline.
//!
//! One entry point, [`ReportEngine::run`], drives every execution the same
//! way: look up the definition, normalize raw input against its schema,
//! fail fast on field errors, consult the cache, execute the report's
//! strategy on a miss, enrich metadata, and write the payload back. Export
//! reuses the same pipeline with the fetch mode forced to `all`.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::cache::{CacheCoordinator, CacheEntry, CacheStore, CacheStoreError, SqliteCacheStore};
use crate::config::Settings;
use crate::export::{ExportFormat, ExportStream};
use crate::provider::{CrmFetcher, DbExecutor, ProviderError};
use crate::query::{FieldError, NormalizedQuery};
use crate::registry::{
    ExecutionStrategy, RegistryError, ReportRegistry, ReportSummary, ResolvedReport,
};
use crate::report::{Helpers, ReportParams, ReportResult, RunnerCtx};
use crate::schema::normalize;

const MSG_BAD_FORMAT: &str = "Formato invalido. Use csv, json ou ndjson.";

/// Engine-level failures, ordered from caller mistakes to downstream faults.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Input rejected by schema normalization. Nothing was executed.
    #[error("parametros invalidos: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Unknown report key.
    #[error("relatorio nao encontrado: {0}")]
    NotFound(String),

    /// Registration-time defect surfaced at run time.
    #[error("configuracao invalida: {0}")]
    Configuration(String),

    /// The strategy itself failed.
    #[error("falha ao executar relatorio {key} (trace {trace_id})")]
    Execution {
        key: String,
        trace_id: String,
        #[source]
        source: ProviderError,
    },
}

impl EngineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Field errors carried by a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<RegistryError> for EngineError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(key) => Self::NotFound(key),
            RegistryError::Duplicate(key) => {
                Self::Configuration(format!("relatorio duplicado: {key}"))
            }
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The engine: registry, providers, cache and settings wired together.
pub struct ReportEngine {
    registry: ReportRegistry,
    crm: Arc<dyn CrmFetcher>,
    db: Arc<dyn DbExecutor>,
    cache: CacheCoordinator,
    helpers: Helpers,
    settings: Settings,
}

impl ReportEngine {
    /// Engine without a cache store; every run executes.
    pub fn new(registry: ReportRegistry, crm: Arc<dyn CrmFetcher>, db: Arc<dyn DbExecutor>) -> Self {
        Self {
            registry,
            crm,
            db,
            cache: CacheCoordinator::disabled(),
            helpers: Helpers,
            settings: Settings::default(),
        }
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = CacheCoordinator::new(
            store,
            self.settings.cache.key_prefix.clone(),
            self.settings.cache.default_ttl_seconds,
        );
        self
    }

    /// Open the configured sqlite cache store, or the platform default path
    /// when settings name none.
    pub fn with_sqlite_cache(self) -> Result<Self, CacheStoreError> {
        let path = match &self.settings.cache.sqlite_path {
            Some(path) => path.clone(),
            None => SqliteCacheStore::default_path()?,
        };
        let store = SqliteCacheStore::open(path)?;
        Ok(self.with_cache_store(Arc::new(store)))
    }

    /// Apply settings; call before [`Self::with_cache_store`] so the cache
    /// picks up the configured prefix and TTL.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &ReportRegistry {
        &self.registry
    }

    /// Listing of all registered reports with their parameter descriptors.
    pub fn list(&self) -> Vec<ReportSummary> {
        self.registry.list()
    }

    /// Execute a report against raw request input.
    pub async fn run(
        &self,
        key: &str,
        raw: &serde_json::Map<String, Value>,
        trace_id: &str,
    ) -> Result<ReportResult, EngineError> {
        let trace_id = if trace_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            trace_id.trim().to_string()
        };

        let definition = self.registry.get(key)?;
        let resolved = self.registry.resolve(definition);

        let (query, errors) = normalize(&resolved.params, raw);
        if !errors.is_empty() {
            tracing::info!(report = key, trace = %trace_id, errors = errors.len(), "rejected invalid parameters");
            return Err(EngineError::Validation(errors));
        }

        let cache_key = self.cache.compute_key(key, &query);
        let ttl = self
            .cache
            .resolve_ttl(query.cache_ttl_override, resolved.cache_ttl);
        let use_cache = self.cache.should_use(query.cache_enabled, ttl);

        if use_cache {
            if let Some(entry) = self.cache.read(&cache_key).await {
                tracing::info!(report = key, trace = %trace_id, "cache hit");
                let mut result = entry.into_result();
                self.bind_meta(&mut result, &resolved, &query, &trace_id, &cache_key, true, 0);
                return Ok(result);
            }
        }

        tracing::info!(report = key, trace = %trace_id, cache = use_cache, "executing report");
        let started = Instant::now();

        let params = ReportParams {
            values: query.params.clone(),
            trace_id: trace_id.clone(),
            page: query.page,
            per_page: query.per_page,
            sort: query.sort.clone(),
            dir: query.dir,
            fetch: query.fetch,
        };

        let mut result = self
            .execute(definition, &resolved, &params)
            .await
            .map_err(|source| {
                tracing::error!(report = key, trace = %trace_id, error = %source, "report execution failed");
                EngineError::Execution {
                    key: key.to_string(),
                    trace_id: trace_id.clone(),
                    source,
                }
            })?;

        if result.columns.is_empty() {
            result.columns = if resolved.columns.is_empty() {
                result.inferred_columns()
            } else {
                resolved.columns.clone()
            };
        }

        let took_ms = started.elapsed().as_millis() as u64;
        self.bind_meta(&mut result, &resolved, &query, &trace_id, &cache_key, false, took_ms);

        if use_cache {
            self.cache
                .write(&cache_key, &CacheEntry::from_result(&result), ttl)
                .await;
        }

        tracing::info!(report = key, trace = %trace_id, rows = result.data.len(), took_ms, "report finished");
        Ok(result)
    }

    /// Execute a report and stream the full result set in the given format.
    ///
    /// The fetch mode is forced to `all` so paging input never truncates an
    /// export. An unknown format is rejected before anything runs.
    pub async fn export(
        &self,
        key: &str,
        raw: &serde_json::Map<String, Value>,
        format: &str,
        trace_id: &str,
    ) -> Result<ExportStream, EngineError> {
        let format = ExportFormat::parse(format).ok_or_else(|| {
            EngineError::Validation(vec![FieldError::new("format", MSG_BAD_FORMAT)])
        })?;

        let mut raw = raw.clone();
        raw.insert("fetch".into(), Value::String("all".into()));

        let result = self.run(key, &raw, trace_id).await?;
        Ok(ExportStream::new(result, format).with_chunk_size(self.settings.export.chunk_size))
    }

    async fn execute(
        &self,
        definition: &crate::registry::ReportDefinition,
        resolved: &ResolvedReport,
        params: &ReportParams,
    ) -> Result<ReportResult, ProviderError> {
        let ctx = RunnerCtx {
            crm: self.crm.as_ref(),
            db: self.db.as_ref(),
            helpers: &self.helpers,
        };
        match &definition.strategy {
            ExecutionStrategy::ClassBased(ctor) => match &resolved.instance {
                Some(instance) => instance.run(ctx, params).await,
                None => ctor().run(ctx, params).await,
            },
            ExecutionStrategy::ClosureBased(runner) => runner(ctx, params).await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_meta(
        &self,
        result: &mut ReportResult,
        resolved: &ResolvedReport,
        query: &NormalizedQuery,
        trace_id: &str,
        cache_key: &str,
        cache_hit: bool,
        took_ms: u64,
    ) {
        let count = result.data.len();
        let meta = &mut result.meta;
        meta.entry("page".to_string())
            .or_insert_with(|| Value::from(query.page));
        meta.entry("per_page".to_string())
            .or_insert_with(|| Value::from(query.per_page));
        meta.entry("count".to_string())
            .or_insert_with(|| Value::from(count));
        meta.entry("total".to_string())
            .or_insert_with(|| Value::from(count));
        meta.entry("source".to_string())
            .or_insert_with(|| Value::String("engine".into()));
        if let Some(sort) = &query.sort {
            meta.insert("sort".into(), Value::String(sort.clone()));
        }
        meta.insert("dir".into(), Value::String(query.dir.as_str().into()));
        meta.insert(
            "cache".into(),
            serde_json::json!({ "hit": cache_hit, "key": cache_key }),
        );
        if !cache_hit {
            meta.entry("took_ms".to_string())
                .or_insert_with(|| Value::from(took_ms));
        }
        if !resolved.description.is_empty() {
            meta.insert(
                "description".into(),
                Value::String(resolved.description.clone()),
            );
        }
        meta.insert("trace_id".into(), Value::String(trace_id.to_string()));
    }
}
