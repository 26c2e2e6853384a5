//! Parameter schema normalization.
//!
//! Each report declares a typed schema for its parameters. Normalization casts
//! raw query input against that schema, applies literal or deferred defaults,
//! checks required fields and enum allow-lists, and resolves the reserved
//! control keys (paging, sort, cache flags, fetch mode) independently of any
//! schema. The output is a [`NormalizedQuery`] plus a list of structured field
//! errors; a non-empty list means the request must be rejected before any
//! execution happens.

mod passthrough;
pub use passthrough::is_allowed;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::query::{
    FetchMode, FieldError, NormalizedQuery, SortDirection, CONTROL_KEYS, DEFAULT_PAGE,
    DEFAULT_PER_PAGE, MAX_PER_PAGE,
};

/// Date format accepted when a date parameter declares none.
pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

/// Required parameter missing from the input.
pub const MSG_REQUIRED: &str = "Parametro obrigatorio";
const MSG_INT: &str = "deve ser um numero inteiro";
const MSG_NUMERIC: &str = "deve ser numerico";
const MSG_DATE: &str = "data invalida";
const MSG_ENUM: &str = "valor nao permitido";
const MSG_SCALAR: &str = "valor invalido";

/// Supported parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Float,
    Bool,
    Date,
    String,
    StringArray,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::String => "string",
            Self::StringArray => "array<string>",
        }
    }
}

/// Default value for a parameter: a literal, or a zero-argument function
/// invoked at normalization time (for values such as "today").
#[derive(Clone)]
pub enum ParamDefault {
    Literal(Value),
    Deferred(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl ParamDefault {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Deferred(producer) => producer(),
        }
    }
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// One schema entry.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub default: Option<ParamDefault>,
    pub required: bool,
    /// Enum allow-list, compared against the string form of the cast value.
    pub allowed: Option<Vec<String>>,
    /// Date format override (date parameters only).
    pub format: Option<String>,
}

impl ParamSpec {
    pub fn new(param_type: ParamType) -> Self {
        Self {
            param_type,
            default: None,
            required: false,
            allowed: None,
            format: None,
        }
    }

    pub fn int() -> Self {
        Self::new(ParamType::Int)
    }

    pub fn float() -> Self {
        Self::new(ParamType::Float)
    }

    pub fn bool() -> Self {
        Self::new(ParamType::Bool)
    }

    pub fn date() -> Self {
        Self::new(ParamType::Date)
    }

    pub fn string() -> Self {
        Self::new(ParamType::String)
    }

    pub fn string_array() -> Self {
        Self::new(ParamType::StringArray)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ParamDefault::Literal(value.into()));
        self
    }

    pub fn deferred_default(mut self, producer: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(ParamDefault::Deferred(Arc::new(producer)));
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Serializable description of this entry, for registry introspection.
    pub fn descriptor(&self, name: &str) -> ParamDescriptor {
        ParamDescriptor {
            name: name.to_string(),
            param_type: self.param_type.as_str(),
            required: self.required,
            allowed: self.allowed.clone(),
            format: self.format.clone(),
            has_default: self.default.is_some(),
        }
    }
}

/// Schema: parameter name to spec.
pub type ParamSchema = BTreeMap<String, ParamSpec>;

/// Build a schema from `(name, spec)` pairs.
pub fn schema_of<I, K>(entries: I) -> ParamSchema
where
    I: IntoIterator<Item = (K, ParamSpec)>,
    K: Into<String>,
{
    entries
        .into_iter()
        .map(|(name, spec)| (name.into(), spec))
        .collect()
}

/// Serializable schema entry, exposed by registry listings.
#[derive(Debug, Clone, Serialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub has_default: bool,
}

/// Normalize raw input against a schema.
///
/// Control keys are always resolved, even when absent from the input. Raw keys
/// that are neither schema parameters nor control keys pass through only when
/// the CRM filter allow-list accepts them.
pub fn normalize(
    schema: &ParamSchema,
    raw: &serde_json::Map<String, Value>,
) -> (NormalizedQuery, Vec<FieldError>) {
    let mut errors = Vec::new();
    let mut params = BTreeMap::new();

    for (name, spec) in schema {
        let mut value = raw.get(name).filter(|v| !value_is_empty(v)).cloned();
        if value.is_none() {
            if let Some(default) = &spec.default {
                let resolved = default.resolve();
                if !value_is_empty(&resolved) {
                    value = Some(resolved);
                }
            }
        }

        let Some(value) = value else {
            if spec.required {
                errors.push(FieldError::new(name, MSG_REQUIRED));
            }
            continue;
        };

        match cast_value(&value, spec) {
            Ok(cast) => {
                if spec.allowed.is_some() && !is_member(&cast, spec) {
                    errors.push(FieldError::new(name, MSG_ENUM));
                    continue;
                }
                params.insert(name.clone(), cast);
            }
            Err(message) => errors.push(FieldError::new(name, message)),
        }
    }

    for (key, value) in raw {
        if schema.contains_key(key) || CONTROL_KEYS.contains(&key.as_str()) {
            continue;
        }
        if !is_allowed(key) {
            continue;
        }
        match value {
            Value::Array(items) => {
                let values: Vec<Value> = items
                    .iter()
                    .filter_map(scalar_string)
                    .filter(|s| !s.is_empty())
                    .map(Value::String)
                    .collect();
                params.insert(key.clone(), Value::Array(values));
            }
            other => {
                if let Some(s) = scalar_string(other).filter(|s| !s.is_empty()) {
                    params.insert(key.clone(), Value::String(s));
                }
            }
        }
    }

    let query = NormalizedQuery {
        params,
        page: raw.get("page").and_then(positive_int).unwrap_or(DEFAULT_PAGE),
        per_page: raw
            .get("per_page")
            .and_then(positive_int)
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE),
        sort: raw.get("sort").and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }),
        dir: SortDirection::parse(raw.get("dir")),
        cache_enabled: match raw.get("cache").and_then(scalar_string) {
            Some(flag) => {
                let flag = flag.to_ascii_lowercase();
                flag != "0" && flag != "false"
            }
            None => true,
        },
        cache_ttl_override: raw.get("cache_ttl").and_then(numeric_i64).map(|v| v.max(0)),
        fetch: match raw.get("fetch").and_then(scalar_string) {
            Some(mode) if mode.eq_ignore_ascii_case("all") => FetchMode::All,
            _ => FetchMode::Page,
        },
    };

    (query, errors)
}

fn cast_value(value: &Value, spec: &ParamSpec) -> Result<Value, &'static str> {
    match spec.param_type {
        ParamType::Int => cast_int(value),
        ParamType::Float => cast_float(value),
        ParamType::Bool => Ok(cast_bool(value)),
        ParamType::Date => cast_date(value, spec.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)),
        ParamType::StringArray => cast_string_array(value),
        ParamType::String => match scalar_string(value) {
            Some(s) => Ok(Value::String(s)),
            None => Err(MSG_SCALAR),
        },
    }
}

fn cast_int(value: &Value) -> Result<Value, &'static str> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                Ok(Value::from(f as i64))
            } else {
                Err(MSG_INT)
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| MSG_INT),
        _ => Err(MSG_INT),
    }
}

fn cast_float(value: &Value) -> Result<Value, &'static str> {
    match value {
        Value::Number(n) => n.as_f64().map(Value::from).ok_or(MSG_NUMERIC),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| MSG_NUMERIC),
        _ => Err(MSG_NUMERIC),
    }
}

fn cast_bool(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        other => {
            let truthy = scalar_string(other)
                .map(|s| {
                    let s = s.to_ascii_lowercase();
                    matches!(s.as_str(), "1" | "true" | "yes" | "on")
                })
                .unwrap_or(false);
            Value::Bool(truthy)
        }
    }
}

fn cast_date(value: &Value, format: &str) -> Result<Value, &'static str> {
    let Value::String(raw) = value else {
        return Err(MSG_DATE);
    };
    let trimmed = raw.trim();
    if date_matches(trimmed, format) {
        Ok(Value::String(trimmed.to_string()))
    } else {
        Err(MSG_DATE)
    }
}

fn cast_string_array(value: &Value) -> Result<Value, &'static str> {
    let items = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
        Value::Array(values) => values
            .iter()
            .filter_map(scalar_string)
            .filter(|s| !s.is_empty())
            .map(Value::String)
            .collect(),
        Value::Number(_) | Value::Bool(_) => scalar_string(value)
            .map(|s| vec![Value::String(s)])
            .unwrap_or_default(),
        _ => return Err(MSG_SCALAR),
    };
    Ok(Value::Array(items))
}

fn is_member(cast: &Value, spec: &ParamSpec) -> bool {
    let Some(allowed) = &spec.allowed else {
        return true;
    };
    match cast {
        Value::Array(items) => items
            .iter()
            .all(|item| scalar_string(item).is_some_and(|s| allowed.contains(&s))),
        other => scalar_string(other).is_some_and(|s| allowed.contains(&s)),
    }
}

/// Validate a date string against a `YYYY-MM-DD`-style format.
///
/// Impossible calendar dates (e.g. `2024-02-30`) are rejected, not just shape
/// mismatches.
pub fn date_matches(value: &str, format: &str) -> bool {
    let translated = format
        .replace("YYYY", "[year]")
        .replace("MM", "[month]")
        .replace("DD", "[day]");
    match time::format_description::parse(&translated) {
        Ok(items) => time::Date::parse(value, items.as_slice()).is_ok(),
        Err(_) => false,
    }
}

fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn numeric_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

fn positive_int(value: &Value) -> Option<u32> {
    numeric_i64(value).filter(|v| *v > 0).map(|v| v.min(u32::MAX as i64) as u32)
}
