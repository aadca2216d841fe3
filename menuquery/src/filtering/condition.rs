//! Storage-native condition tree.
//!
//! A [`Where`] is what the operator compiler produces and what every
//! [`Storage`](crate::storage::Storage) implementation consumes. It renders to the
//! relational-client JSON shape through [`Where::to_json`], e.g.
//!
//! ```json
//! { "store": { "title": { "contains": "x", "mode": "insensitive" } } }
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// String matching mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Insensitive,
    Sensitive,
}

impl MatchMode {
    #[must_use]
    pub const fn from_case_sensitive(case_sensitive: bool) -> Self {
        if case_sensitive {
            Self::Sensitive
        } else {
            Self::Insensitive
        }
    }

    #[must_use]
    pub const fn is_insensitive(self) -> bool {
        matches!(self, Self::Insensitive)
    }
}

/// Substring operators sharing escaping and case folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl TextOp {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }

    /// Match `haystack` against `needle`; both already case-folded when needed.
    #[must_use]
    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        match self {
            Self::Contains => haystack.contains(needle),
            Self::StartsWith => haystack.starts_with(needle),
            Self::EndsWith => haystack.ends_with(needle),
        }
    }
}

/// Condition on one scalar column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// `Equals(Value::Null)` is an IS NULL check
    Equals(Value),
    NotEquals(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// Inclusive on both ends
    Between(Value, Value),
    Text {
        op: TextOp,
        value: String,
        mode: MatchMode,
        negated: bool,
    },
    IsNull,
    IsNotNull,
    Regex {
        pattern: String,
        mode: MatchMode,
    },
    /// Every whitespace-separated term must occur
    Search {
        terms: String,
        mode: MatchMode,
    },
    /// Scalar-list column contains the value
    Has(Value),
    HasNot(Value),
}

impl FieldCondition {
    fn to_json(&self) -> Value {
        match self {
            Self::Equals(Value::Null) | Self::IsNull => Value::Null,
            Self::Equals(v) => v.clone(),
            Self::NotEquals(v) => json!({ "not": v }),
            Self::Gt(v) => json!({ "gt": v }),
            Self::Gte(v) => json!({ "gte": v }),
            Self::Lt(v) => json!({ "lt": v }),
            Self::Lte(v) => json!({ "lte": v }),
            Self::In(vs) => json!({ "in": vs }),
            Self::NotIn(vs) => json!({ "notIn": vs }),
            Self::Between(lo, hi) => json!({ "gte": lo, "lte": hi }),
            Self::Text {
                op,
                value,
                mode,
                negated,
            } => {
                let mut inner = Map::new();
                inner.insert(op.key().to_string(), Value::String(value.clone()));
                if mode.is_insensitive() {
                    inner.insert("mode".to_string(), json!("insensitive"));
                }
                if *negated {
                    json!({ "not": inner })
                } else {
                    Value::Object(inner)
                }
            }
            Self::IsNotNull => json!({ "not": null }),
            Self::Regex { pattern, mode } => with_mode(json!({ "regex": pattern }), *mode),
            Self::Search { terms, mode } => with_mode(json!({ "search": terms }), *mode),
            Self::Has(v) => json!({ "has": v }),
            Self::HasNot(v) => json!({ "not": { "has": v } }),
        }
    }
}

fn with_mode(mut value: Value, mode: MatchMode) -> Value {
    if mode.is_insensitive()
        && let Value::Object(map) = &mut value
    {
        map.insert("mode".to_string(), json!("insensitive"));
    }
    value
}

/// How a condition nested under a relation is quantified over the related rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// Plain nesting: to-one relation, or "at least one" for to-many
    Is,
    Some,
    Every,
    None,
}

impl Quantifier {
    const fn key(self) -> Option<&'static str> {
        match self {
            Self::Is => None,
            Self::Some => Some("some"),
            Self::Every => Some("every"),
            Self::None => Some("none"),
        }
    }
}

/// A boolean condition tree over one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// AND; empty matches everything
    All(Vec<Where>),
    /// OR; empty matches nothing
    Any(Vec<Where>),
    Not(Box<Where>),
    Field {
        field: String,
        condition: FieldCondition,
    },
    Relation {
        relation: String,
        quantifier: Quantifier,
        condition: Box<Where>,
    },
}

impl Default for Where {
    fn default() -> Self {
        Self::All(Vec::new())
    }
}

impl Where {
    #[must_use]
    pub fn field(field: impl Into<String>, condition: FieldCondition) -> Self {
        Self::Field {
            field: field.into(),
            condition,
        }
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, FieldCondition::Equals(value.into()))
    }

    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::field(field, FieldCondition::IsNull)
    }

    #[must_use]
    pub fn relation(relation: impl Into<String>, quantifier: Quantifier, condition: Self) -> Self {
        Self::Relation {
            relation: relation.into(),
            quantifier,
            condition: Box::new(condition),
        }
    }

    /// Nest `self` under a dot-separated relation path, outermost segment first.
    #[must_use]
    pub fn nested_under(self, path: &[String]) -> Self {
        path.iter()
            .rev()
            .fold(self, |inner, segment| Self::relation(segment.clone(), Quantifier::Is, inner))
    }

    /// AND-combine, flattening nested conjunctions and dropping no-op members.
    #[must_use]
    pub fn and(conditions: impl IntoIterator<Item = Self>) -> Self {
        let mut flat = Vec::new();
        for condition in conditions {
            match condition {
                Self::All(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::All(flat)
        }
    }

    /// OR-combine; a single member is returned unchanged.
    #[must_use]
    pub fn or(conditions: impl IntoIterator<Item = Self>) -> Self {
        let mut members: Vec<Self> = conditions.into_iter().collect();
        if members.len() == 1 {
            members.remove(0)
        } else {
            Self::Any(members)
        }
    }

    #[must_use]
    pub fn is_match_all(&self) -> bool {
        matches!(self, Self::All(members) if members.is_empty())
    }

    /// Render as relational-client filter JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::All(members) if members.is_empty() => json!({}),
            Self::All(members) => {
                json!({ "AND": members.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Any(members) => {
                json!({ "OR": members.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Not(inner) => json!({ "NOT": inner.to_json() }),
            Self::Field { field, condition } => {
                let mut map = Map::new();
                map.insert(field.clone(), condition.to_json());
                Value::Object(map)
            }
            Self::Relation {
                relation,
                quantifier,
                condition,
            } => {
                let inner = match quantifier.key() {
                    Some(key) => json!({ key: condition.to_json() }),
                    None => condition.to_json(),
                };
                let mut map = Map::new();
                map.insert(relation.clone(), inner);
                Value::Object(map)
            }
        }
    }
}

impl Serialize for Where {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
