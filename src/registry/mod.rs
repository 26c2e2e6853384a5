//! Report definition registry.
//!
//! Definitions are registered once at startup and immutable afterwards.
//! Class-based report instances are constructed lazily on first use and
//! memoized for the registry's lifetime; a race on first construction at
//! worst builds a redundant instance, which is harmless because constructors
//! are side-effect-free.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::report::{ColumnSpec, Report, ReportParams, Runner, RunnerCtx, RunnerFuture};
use crate::schema::{ParamDescriptor, ParamSchema};

/// Constructor for a class-based report instance.
pub type ReportCtor = Arc<dyn Fn() -> Arc<dyn Report> + Send + Sync>;

/// How a report computes its result.
#[derive(Clone)]
pub enum ExecutionStrategy {
    /// Lazily constructed report object.
    ClassBased(ReportCtor),
    /// Registered runner function.
    ClosureBased(Arc<Runner>),
}

impl fmt::Debug for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassBased(_) => f.write_str("ClassBased(..)"),
            Self::ClosureBased(_) => f.write_str("ClosureBased(..)"),
        }
    }
}

/// Static registration describing one report.
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    pub key: String,
    pub title: String,
    pub description: String,
    /// May be empty; resolved from the instance or inferred from data later.
    pub columns: Vec<ColumnSpec>,
    pub params: ParamSchema,
    /// Declared TTL for closure reports; class reports expose their own.
    pub cache_ttl: Option<u64>,
    pub strategy: ExecutionStrategy,
}

impl ReportDefinition {
    /// Definition backed by a report object; metadata comes from the
    /// instance.
    pub fn class(
        key: impl Into<String>,
        ctor: impl Fn() -> Arc<dyn Report> + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            title: String::new(),
            description: String::new(),
            columns: Vec::new(),
            params: ParamSchema::new(),
            cache_ttl: None,
            strategy: ExecutionStrategy::ClassBased(Arc::new(ctor)),
        }
    }

    /// Definition backed by a runner function; metadata is declared here.
    pub fn closure<F>(key: impl Into<String>, runner: F) -> Self
    where
        F: for<'a> Fn(RunnerCtx<'a>, &'a ReportParams) -> RunnerFuture<'a> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            title: String::new(),
            description: String::new(),
            columns: Vec::new(),
            params: ParamSchema::new(),
            cache_ttl: None,
            strategy: ExecutionStrategy::ClosureBased(Arc::new(runner)),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }

    pub fn params(mut self, params: ParamSchema) -> Self {
        self.params = params;
        self
    }

    pub fn cache_ttl(mut self, ttl_seconds: u64) -> Self {
        self.cache_ttl = Some(ttl_seconds);
        self
    }
}

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Unregistered report key.
    #[error("relatorio nao encontrado: {0}")]
    NotFound(String),

    /// Two definitions registered under the same key.
    #[error("relatorio duplicado: {0}")]
    Duplicate(String),
}

/// Effective metadata for one definition, with both strategies resolved to a
/// uniform shape.
pub struct ResolvedReport {
    pub title: String,
    pub description: String,
    pub columns: Vec<ColumnSpec>,
    pub params: ParamSchema,
    pub cache_ttl: Option<u64>,
    /// Present only for class-based definitions.
    pub instance: Option<Arc<dyn Report>>,
}

/// Serializable listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub key: String,
    pub title: String,
    pub description: String,
    pub columns: Vec<ColumnSpec>,
    pub params: Vec<ParamDescriptor>,
}

/// Indexed, immutable set of report definitions.
#[derive(Default)]
pub struct ReportRegistry {
    definitions: BTreeMap<String, ReportDefinition>,
    instances: DashMap<String, Arc<dyn Report>>,
}

impl ReportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ReportDefinition) -> Result<(), RegistryError> {
        if self.definitions.contains_key(&definition.key) {
            return Err(RegistryError::Duplicate(definition.key));
        }
        self.definitions.insert(definition.key.clone(), definition);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&ReportDefinition, RegistryError> {
        self.definitions
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolve effective metadata: from the memoized instance for class-based
    /// definitions, from the definition itself otherwise. Registered metadata
    /// wins over instance metadata when both are present.
    pub fn resolve(&self, definition: &ReportDefinition) -> ResolvedReport {
        let instance = self.instance(definition);

        let mut resolved = ResolvedReport {
            title: definition.title.clone(),
            description: definition.description.clone(),
            columns: definition.columns.clone(),
            params: definition.params.clone(),
            cache_ttl: definition.cache_ttl,
            instance,
        };

        if let Some(report) = &resolved.instance {
            if resolved.title.is_empty() {
                resolved.title = report.title().to_string();
            }
            if resolved.description.is_empty() {
                resolved.description = report.description().to_string();
            }
            if resolved.columns.is_empty() {
                resolved.columns = report.columns();
            }
            if resolved.params.is_empty() {
                resolved.params = report.params();
            }
            if resolved.cache_ttl.is_none() {
                resolved.cache_ttl = report.cache_ttl();
            }
        }

        resolved
    }

    /// Listing of every registered report.
    pub fn list(&self) -> Vec<ReportSummary> {
        self.definitions
            .values()
            .map(|definition| {
                let resolved = self.resolve(definition);
                ReportSummary {
                    key: definition.key.clone(),
                    title: if resolved.title.is_empty() {
                        definition.key.clone()
                    } else {
                        resolved.title
                    },
                    description: resolved.description,
                    columns: resolved.columns,
                    params: resolved
                        .params
                        .iter()
                        .map(|(name, spec)| spec.descriptor(name))
                        .collect(),
                }
            })
            .collect()
    }

    fn instance(&self, definition: &ReportDefinition) -> Option<Arc<dyn Report>> {
        match &definition.strategy {
            ExecutionStrategy::ClassBased(ctor) => Some(
                self.instances
                    .entry(definition.key.clone())
                    .or_insert_with(|| ctor())
                    .clone(),
            ),
            ExecutionStrategy::ClosureBased(_) => None,
        }
    }
}

impl fmt::Debug for ReportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportRegistry")
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("instances", &self.instances.len())
            .finish()
    }
}
