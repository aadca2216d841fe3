use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{ValidationError, validators::validate_identifier};

/// Conventional creation-time column used for the default ordering
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Accepts `asc` / `desc` in any case
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderBy(pub Vec<(String, SortOrder)>);

impl OrderBy {
    #[must_use]
    pub fn by(field: impl Into<String>, order: SortOrder) -> Self {
        Self(vec![(field.into(), order)])
    }

    /// Creation-time descending
    #[must_use]
    pub fn newest_first() -> Self {
        Self::by(DEFAULT_SORT_FIELD, SortOrder::Desc)
    }

    #[must_use]
    pub fn then(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.0.push((field.into(), order));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortOrder)> {
        self.0.iter().map(|(field, order)| (field.as_str(), *order))
    }

    /// Parse an `orderBy` request value.
    ///
    /// Accepted forms:
    /// - `{"createdAt": "desc", "title": "asc"}` (key order is precedence)
    /// - `[{"createdAt": "desc"}, {"title": "asc"}]`
    /// - `["title", "ASC"]` (React Admin)
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` on unknown directions or invalid field names.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let mut keys = Vec::new();
        match value {
            Value::Object(map) => {
                for (field, direction) in map {
                    keys.push(parse_key(field, direction)?);
                }
            }
            Value::Array(items) => {
                if let [Value::String(field), Value::String(direction)] = items.as_slice() {
                    keys.push(parse_key(field, &Value::String(direction.clone()))?);
                } else {
                    for item in items {
                        let Value::Object(map) = item else {
                            return Err(invalid("orderBy entries must be objects"));
                        };
                        for (field, direction) in map {
                            keys.push(parse_key(field, direction)?);
                        }
                    }
                }
            }
            _ => return Err(invalid("orderBy must be an object or a list")),
        }
        Ok(Self(keys))
    }

    /// Parse the REST `sortBy` + `order` pair; a missing order means ascending.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` on an unknown direction or invalid field name.
    pub fn from_pair(sort_by: &str, order: Option<&str>) -> Result<Self, ValidationError> {
        let direction = order.unwrap_or("asc");
        Ok(Self(vec![parse_key(sort_by, &Value::String(direction.to_string()))?]))
    }
}

fn invalid(message: &str) -> ValidationError {
    ValidationError::new("orderBy", message)
}

fn parse_key(field: &str, direction: &Value) -> Result<(String, SortOrder), ValidationError> {
    validate_identifier("orderBy", field)?;
    let order = direction
        .as_str()
        .and_then(SortOrder::parse)
        .ok_or_else(|| invalid(&format!("invalid sort direction for {field}: {direction}")))?;
    Ok((field.to_string(), order))
}
