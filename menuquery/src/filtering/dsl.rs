//! Filter Specification: the advanced-search DSL.
//!
//! On the wire a specification is a loose JSON object
//!
//! ```json
//! { "field": "price", "operation": "between", "value": [5, 10], "relation": "item" }
//! ```
//!
//! which is checked once, on deserialization, into [`FilterSpec`]. Each [`Operation`]
//! variant carries exactly the value shape its operator needs (none, a scalar, a
//! pair, a list, or nested specifications), so the compiler never has to guess what
//! a value means.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::validation::{ValidationError, validators::validate_identifier};

/// The closed set of operator names accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    Between,
    Regex,
    Search,
    Has,
    HasNot,
    Some,
    Every,
    None,
}

impl OperatorKind {
    pub const ALL: [Self; 22] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::NotContains,
        Self::StartsWith,
        Self::EndsWith,
        Self::IsNull,
        Self::IsNotNull,
        Self::Between,
        Self::Regex,
        Self::Search,
        Self::Has,
        Self::HasNot,
        Self::Some,
        Self::Every,
        Self::None,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
            Self::Between => "between",
            Self::Regex => "regex",
            Self::Search => "search",
            Self::Has => "has",
            Self::HasNot => "hasNot",
            Self::Some => "some",
            Self::Every => "every",
            Self::None => "none",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::new("operation", format!("Unsupported operation: {s}")))
    }
}

/// An operator together with its statically shaped operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    IsNull,
    IsNotNull,
    Between(Value, Value),
    Regex(String),
    Search(String),
    Has(Value),
    HasNot(Value),
    /// Quantifiers over a to-many relation named by the spec's `field`
    Some(Vec<FilterSpec>),
    Every(Vec<FilterSpec>),
    None(Vec<FilterSpec>),
}

impl Operation {
    #[must_use]
    pub const fn kind(&self) -> OperatorKind {
        match self {
            Self::Eq(_) => OperatorKind::Eq,
            Self::Ne(_) => OperatorKind::Ne,
            Self::Gt(_) => OperatorKind::Gt,
            Self::Gte(_) => OperatorKind::Gte,
            Self::Lt(_) => OperatorKind::Lt,
            Self::Lte(_) => OperatorKind::Lte,
            Self::In(_) => OperatorKind::In,
            Self::NotIn(_) => OperatorKind::NotIn,
            Self::Contains(_) => OperatorKind::Contains,
            Self::NotContains(_) => OperatorKind::NotContains,
            Self::StartsWith(_) => OperatorKind::StartsWith,
            Self::EndsWith(_) => OperatorKind::EndsWith,
            Self::IsNull => OperatorKind::IsNull,
            Self::IsNotNull => OperatorKind::IsNotNull,
            Self::Between(..) => OperatorKind::Between,
            Self::Regex(_) => OperatorKind::Regex,
            Self::Search(_) => OperatorKind::Search,
            Self::Has(_) => OperatorKind::Has,
            Self::HasNot(_) => OperatorKind::HasNot,
            Self::Some(_) => OperatorKind::Some,
            Self::Every(_) => OperatorKind::Every,
            Self::None(_) => OperatorKind::None,
        }
    }

    /// Check a loose wire value against the shape `kind` requires.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming `field` when the value has the wrong shape.
    pub fn from_parts(kind: OperatorKind, value: Value, field: &str) -> Result<Self, ValidationError> {
        let op = match kind {
            OperatorKind::Eq => Self::Eq(scalar_or_null(value, field, kind)?),
            OperatorKind::Ne => Self::Ne(scalar_or_null(value, field, kind)?),
            OperatorKind::Gt => Self::Gt(comparable(value, field, kind)?),
            OperatorKind::Gte => Self::Gte(comparable(value, field, kind)?),
            OperatorKind::Lt => Self::Lt(comparable(value, field, kind)?),
            OperatorKind::Lte => Self::Lte(comparable(value, field, kind)?),
            OperatorKind::In => Self::In(list(value, field, kind)?),
            OperatorKind::NotIn => Self::NotIn(list(value, field, kind)?),
            OperatorKind::Contains => Self::Contains(text(value, field, kind)?),
            OperatorKind::NotContains => Self::NotContains(text(value, field, kind)?),
            OperatorKind::StartsWith => Self::StartsWith(text(value, field, kind)?),
            OperatorKind::EndsWith => Self::EndsWith(text(value, field, kind)?),
            OperatorKind::IsNull => Self::IsNull,
            OperatorKind::IsNotNull => Self::IsNotNull,
            OperatorKind::Between => {
                let (lo, hi) = pair(value, field)?;
                Self::Between(lo, hi)
            }
            OperatorKind::Regex => Self::Regex(text(value, field, kind)?),
            OperatorKind::Search => Self::Search(text(value, field, kind)?),
            OperatorKind::Has => Self::Has(scalar(value, field, kind)?),
            OperatorKind::HasNot => Self::HasNot(scalar(value, field, kind)?),
            OperatorKind::Some => Self::Some(nested(value, field, kind)?),
            OperatorKind::Every => Self::Every(nested(value, field, kind)?),
            OperatorKind::None => Self::None(nested(value, field, kind)?),
        };
        Ok(op)
    }

    fn wire_value(&self) -> Value {
        match self {
            Self::Eq(v)
            | Self::Ne(v)
            | Self::Gt(v)
            | Self::Gte(v)
            | Self::Lt(v)
            | Self::Lte(v)
            | Self::Has(v)
            | Self::HasNot(v) => v.clone(),
            Self::In(vs) | Self::NotIn(vs) => Value::Array(vs.clone()),
            Self::Contains(s)
            | Self::NotContains(s)
            | Self::StartsWith(s)
            | Self::EndsWith(s)
            | Self::Regex(s)
            | Self::Search(s) => Value::String(s.clone()),
            Self::IsNull | Self::IsNotNull => Value::Null,
            Self::Between(lo, hi) => json!([lo, hi]),
            Self::Some(specs) | Self::Every(specs) | Self::None(specs) => specs
                .iter()
                .cloned()
                .map(|spec| RawFilterSpec::from(spec).into_json())
                .collect(),
        }
    }
}

fn shape_error(field: &str, kind: OperatorKind, expected: &str) -> ValidationError {
    ValidationError::new(field, format!("{kind} expects {expected}"))
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn scalar_or_null(value: Value, field: &str, kind: OperatorKind) -> Result<Value, ValidationError> {
    if value.is_null() || is_scalar(&value) {
        Ok(value)
    } else {
        Err(shape_error(field, kind, "a scalar value or null"))
    }
}

fn scalar(value: Value, field: &str, kind: OperatorKind) -> Result<Value, ValidationError> {
    if is_scalar(&value) {
        Ok(value)
    } else {
        Err(shape_error(field, kind, "a scalar value"))
    }
}

fn comparable(value: Value, field: &str, kind: OperatorKind) -> Result<Value, ValidationError> {
    match value {
        Value::Number(_) | Value::String(_) => Ok(value),
        _ => Err(shape_error(field, kind, "a number or a date")),
    }
}

fn text(value: Value, field: &str, kind: OperatorKind) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(shape_error(field, kind, "a string")),
    }
}

/// Scalars are wrapped into a one-element list.
fn list(value: Value, field: &str, kind: OperatorKind) -> Result<Vec<Value>, ValidationError> {
    let values = match value {
        Value::Array(values) => values,
        other if is_scalar(&other) => vec![other],
        _ => return Err(shape_error(field, kind, "a list of scalar values")),
    };
    if values.iter().all(is_scalar) {
        Ok(values)
    } else {
        Err(shape_error(field, kind, "a list of scalar values"))
    }
}

fn pair(value: Value, field: &str) -> Result<(Value, Value), ValidationError> {
    let Value::Array(values) = value else {
        return Err(ValidationError::new(
            field,
            "between requires exactly 2 values, got a non-list value",
        ));
    };
    let [lo, hi]: [Value; 2] = values.try_into().map_err(|values: Vec<Value>| {
        ValidationError::new(
            field,
            format!("between requires exactly 2 values, got {}", values.len()),
        )
    })?;
    let lo = comparable(lo, field, OperatorKind::Between)?;
    let hi = comparable(hi, field, OperatorKind::Between)?;
    Ok((lo, hi))
}

/// Nested specifications, either as a list of specs or as an equality map.
fn nested(value: Value, field: &str, kind: OperatorKind) -> Result<Vec<FilterSpec>, ValidationError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                let raw: RawFilterSpec = serde_json::from_value(item)
                    .map_err(|e| ValidationError::new(field, format!("invalid nested filter: {e}")))?;
                FilterSpec::try_from(raw)
            })
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(name, v)| FilterSpec::new(name.as_str(), Operation::from_parts(OperatorKind::Eq, v, &name)?))
            .collect(),
        _ => Err(shape_error(field, kind, "a list of filters or a field map")),
    }
}

/// Loosely typed wire form of a filter specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawFilterSpec {
    /// Target attribute (or to-many relation for `some` / `every` / `none`)
    pub field: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    /// One of `eq`, `ne`, `gt`, `gte`, `lt`, `lte`, `in`, `notIn`, `contains`,
    /// `notContains`, `startsWith`, `endsWith`, `isNull`, `isNotNull`, `between`,
    /// `regex`, `search`, `has`, `hasNot`, `some`, `every`, `none`
    pub operation: String,
    /// Relation name or dotted relation path the condition is nested under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
}

/// One validated constraint of the advanced-search DSL. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilterSpec", into = "RawFilterSpec")]
pub struct FilterSpec {
    field: String,
    relation: Vec<String>,
    operation: Operation,
    case_sensitive: bool,
}

impl FilterSpec {
    /// # Errors
    ///
    /// Returns a `ValidationError` when `field` is not a plain identifier.
    pub fn new(field: &str, operation: Operation) -> Result<Self, ValidationError> {
        validate_identifier("field", field)?;
        Ok(Self {
            field: field.to_string(),
            relation: Vec::new(),
            operation,
            case_sensitive: false,
        })
    }

    /// Nest under a relation path such as `store` or `store.owner`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when a path segment is not a plain identifier.
    pub fn under(mut self, path: &str) -> Result<Self, ValidationError> {
        self.relation = parse_relation_path(path)?;
        Ok(self)
    }

    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn relation_path(&self) -> &[String] {
        &self.relation
    }

    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Key used when the spec is stored in a field-keyed filter map.
    #[must_use]
    pub fn target(&self) -> String {
        if self.relation.is_empty() {
            self.field.clone()
        } else {
            format!("{}.{}", self.relation.join("."), self.field)
        }
    }

    /// Equality shorthand; infallible for identifiers known at compile time.
    #[must_use]
    pub fn eq_static(field: &'static str, value: impl Into<Value>) -> Self {
        Self::fixed(field, Operation::Eq(value.into()))
    }

    #[must_use]
    pub fn between_static(field: &'static str, lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        Self::fixed(field, Operation::Between(lo.into(), hi.into()))
    }

    /// For field names written in this crate, which are valid identifiers by construction.
    #[must_use]
    pub(crate) fn fixed(field: &'static str, operation: Operation) -> Self {
        Self {
            field: field.to_string(),
            relation: Vec::new(),
            operation,
            case_sensitive: false,
        }
    }
}

fn parse_relation_path(path: &str) -> Result<Vec<String>, ValidationError> {
    path.split('.')
        .map(|segment| {
            validate_identifier("relation", segment)?;
            Ok(segment.to_string())
        })
        .collect()
}

impl TryFrom<RawFilterSpec> for FilterSpec {
    type Error = ValidationError;

    fn try_from(raw: RawFilterSpec) -> Result<Self, Self::Error> {
        validate_identifier("field", &raw.field)?;
        let kind: OperatorKind = raw.operation.parse()?;
        let operation = Operation::from_parts(kind, raw.value, &raw.field)?;
        let relation = match raw.relation.as_deref() {
            Some(path) if !path.is_empty() => parse_relation_path(path)?,
            _ => Vec::new(),
        };
        Ok(Self {
            field: raw.field,
            relation,
            operation,
            case_sensitive: raw.case_sensitive.unwrap_or(false),
        })
    }
}

impl RawFilterSpec {
    /// The same object `Serialize` produces, built directly so nesting cannot fail.
    #[must_use]
    pub fn into_json(self) -> Value {
        let mut object = Map::new();
        object.insert("field".to_string(), Value::String(self.field));
        if !self.value.is_null() {
            object.insert("value".to_string(), self.value);
        }
        object.insert("operation".to_string(), Value::String(self.operation));
        if let Some(relation) = self.relation {
            object.insert("relation".to_string(), Value::String(relation));
        }
        if let Some(case_sensitive) = self.case_sensitive {
            object.insert("caseSensitive".to_string(), Value::Bool(case_sensitive));
        }
        Value::Object(object)
    }
}

impl From<FilterSpec> for RawFilterSpec {
    fn from(spec: FilterSpec) -> Self {
        Self {
            value: spec.operation.wire_value(),
            operation: spec.operation.kind().as_str().to_string(),
            relation: (!spec.relation.is_empty()).then(|| spec.relation.join(".")),
            case_sensitive: spec.case_sensitive.then_some(true),
            field: spec.field,
        }
    }
}
