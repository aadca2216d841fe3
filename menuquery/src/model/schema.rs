//! Validation schemas derived from a [`ModelDescription`].
//!
//! | schema | accepts |
//! |---|---|
//! | [`CreateSchema`] | every column field; required ones mandatory, defaults filled in |
//! | [`UpdateSchema`] | every column field optional, primary key mandatory |
//! | [`ListSchema`] | pagination, search, advanced search, one optional filter per filterable field |
//! | [`IdSchema`] | a primary key, for get and delete |

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use super::description::{FieldDescription, FieldType, ModelDescription};
use crate::filtering::{FieldCondition, FilterSpec, Operation, Where};
use crate::list_endpoint::{ListParams, ListRequest};
use crate::storage::Row;
use crate::validation::{
    ValidationError, ValidationErrors,
    validators::{
        validate_email, validate_length, validate_one_of, validate_pattern, validate_range,
        validate_required,
    },
};

/// Check one non-null value against a field's type and bounds.
pub(crate) fn check_value(field: &FieldDescription, value: &Value) -> Result<(), ValidationError> {
    let name = field.name.as_str();
    let bounds = &field.bounds;
    let expected = |what: &str| ValidationError::new(name, format!("Expected {what}"));

    match &field.ty {
        FieldType::String | FieldType::Text | FieldType::Email => {
            let s = value.as_str().ok_or_else(|| expected("a string"))?;
            if field.required {
                validate_required(name, s)?;
            }
            validate_length(name, s, bounds.min_length, bounds.max_length)?;
            if field.ty == FieldType::Email {
                validate_email(name, s)?;
            }
            if let Some(pattern) = &bounds.pattern {
                let regex = Regex::new(pattern)
                    .map_err(|e| ValidationError::new(name, format!("invalid pattern: {e}")))?;
                validate_pattern(name, s, &regex)?;
            }
            if let Some(allowed) = &bounds.one_of {
                validate_one_of(name, s, allowed)?;
            }
        }
        FieldType::Int => {
            let n = value.as_i64().ok_or_else(|| expected("an integer"))?;
            #[allow(clippy::cast_precision_loss)]
            let n = n as f64;
            validate_range(name, n, bounds.min, bounds.max)?;
        }
        FieldType::Float => {
            let n = value.as_f64().ok_or_else(|| expected("a number"))?;
            validate_range(name, n, bounds.min, bounds.max)?;
        }
        FieldType::Boolean => {
            value.as_bool().ok_or_else(|| expected("a boolean"))?;
        }
        FieldType::DateTime => {
            let s = value.as_str().ok_or_else(|| expected("a date-time string"))?;
            let valid = DateTime::parse_from_rfc3339(s).is_ok()
                || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
            if !valid {
                return Err(expected("an RFC 3339 date-time or YYYY-MM-DD date"));
            }
        }
        FieldType::Uuid => {
            let s = value.as_str().ok_or_else(|| expected("a UUID string"))?;
            Uuid::parse_str(s).map_err(|_| expected("a UUID"))?;
        }
        FieldType::Enum(values) => {
            let s = value.as_str().ok_or_else(|| expected("a string"))?;
            validate_one_of(name, s, values)?;
        }
        FieldType::Json => {}
        FieldType::Relation => {
            return Err(ValidationError::new(name, "relation fields are not writable"));
        }
    }
    Ok(())
}

/// Query-string values arrive as strings; convert them to the field's JSON type.
fn coerce(field: &FieldDescription, value: Value) -> Value {
    let Value::String(s) = &value else {
        return value;
    };
    match field.ty {
        FieldType::Int => s.parse::<i64>().map_or(value, Value::from),
        FieldType::Float => s.parse::<f64>().map_or(value, Value::from),
        FieldType::Boolean => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value,
        },
        _ => value,
    }
}

fn expect_object<'v>(input: &'v Value, errors: &mut ValidationErrors) -> Option<&'v Map<String, Value>> {
    let object = input.as_object();
    if object.is_none() {
        errors.push("body", "Expected a JSON object");
    }
    object
}

#[derive(Debug, Clone)]
pub struct CreateSchema {
    fields: Vec<FieldDescription>,
}

impl CreateSchema {
    #[must_use]
    pub fn new(model: &ModelDescription) -> Self {
        Self {
            fields: model.columns().cloned().collect(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescription] {
        &self.fields
    }

    /// Validate a create payload and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns every failing field, including unknown ones.
    pub fn validate(&self, input: &Value) -> Result<Row, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(object) = expect_object(input, &mut errors) else {
            return Err(errors);
        };
        reject_unknown(object, &self.fields, &mut errors);

        let mut row = Row::new();
        for field in &self.fields {
            match object.get(&field.name) {
                Some(value) if !value.is_null() => {
                    errors.check(check_value(field, value));
                    row.insert(field.name.clone(), value.clone());
                }
                given => {
                    if let Some(default) = &field.default {
                        row.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        errors.push(field.name.as_str(), "This field is required");
                    } else if given.is_some() {
                        row.insert(field.name.clone(), Value::Null);
                    }
                }
            }
        }
        errors.result()?;
        Ok(row)
    }
}

fn reject_unknown(object: &Map<String, Value>, fields: &[FieldDescription], errors: &mut ValidationErrors) {
    for key in object.keys() {
        if !fields.iter().any(|f| &f.name == key) {
            errors.push(key.as_str(), "unknown field");
        }
    }
}

/// A validated update: the target id and the columns to change.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInput {
    pub id: String,
    pub patch: Row,
}

#[derive(Debug, Clone)]
pub struct UpdateSchema {
    primary_key: String,
    fields: Vec<FieldDescription>,
}

impl UpdateSchema {
    #[must_use]
    pub fn new(model: &ModelDescription) -> Self {
        Self {
            primary_key: model.primary_key.clone(),
            fields: model.columns().cloned().collect(),
        }
    }

    /// # Errors
    ///
    /// Returns every failing field; the primary key is mandatory and required fields
    /// cannot be set to null.
    pub fn validate(&self, input: &Value) -> Result<UpdateInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(object) = expect_object(input, &mut errors) else {
            return Err(errors);
        };

        let id = object
            .get(&self.primary_key)
            .and_then(id_string)
            .unwrap_or_else(|| {
                errors.push(self.primary_key.as_str(), "This field is required");
                String::new()
            });

        let mut patch = Row::new();
        for (key, value) in object {
            if key == &self.primary_key {
                continue;
            }
            let Some(field) = self.fields.iter().find(|f| &f.name == key) else {
                errors.push(key.as_str(), "unknown field");
                continue;
            };
            if value.is_null() {
                if field.required {
                    errors.push(key.as_str(), "This field is required");
                }
            } else {
                errors.check(check_value(field, value));
            }
            patch.insert(key.clone(), value.clone());
        }
        errors.result()?;
        Ok(UpdateInput { id, patch })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Primary-key schema shared by get and delete.
#[derive(Debug, Clone)]
pub struct IdSchema {
    primary_key: String,
}

impl IdSchema {
    #[must_use]
    pub fn new(model: &ModelDescription) -> Self {
        Self {
            primary_key: model.primary_key.clone(),
        }
    }

    /// Accepts `{ "<pk>": ... }` or a bare id.
    ///
    /// # Errors
    ///
    /// Returns an error keyed by the primary key when no usable id is present.
    pub fn validate(&self, input: &Value) -> Result<String, ValidationErrors> {
        let value = input.get(&self.primary_key).unwrap_or(input);
        id_string(value).ok_or_else(|| {
            ValidationErrors::from(ValidationError::new(self.primary_key.as_str(), "This field is required"))
        })
    }
}

/// Columns a model can be filtered on and where its relations lead.
#[derive(Debug, Clone, Default)]
struct FieldScope {
    columns: HashSet<String>,
    /// Relation name to target collection
    relations: HashMap<String, String>,
}

impl FieldScope {
    fn of(model: &ModelDescription) -> Self {
        let mut columns: HashSet<String> = model.columns().map(|f| f.name.clone()).collect();
        columns.extend(model.implicit_columns().into_iter().map(str::to_string));
        let relations = model
            .relation_fields()
            .filter_map(|f| Some((f.name.clone(), f.relation.as_ref()?.model.clone())))
            .collect();
        Self { columns, relations }
    }

    fn knows(&self, name: &str) -> bool {
        self.columns.contains(name) || self.relations.contains_key(name)
    }
}

#[derive(Debug, Clone)]
pub struct ListSchema {
    filterable: Vec<FieldDescription>,
    sortable: HashSet<String>,
    scope: FieldScope,
    /// Scopes of related collections, keyed by collection; filled by [`link`](Self::link)
    related: HashMap<String, FieldScope>,
}

impl ListSchema {
    #[must_use]
    pub fn new(model: &ModelDescription) -> Self {
        let scope = FieldScope::of(model);
        let sortable = scope.columns.iter().filter(|c| model.is_sortable(c)).cloned().collect();
        Self {
            filterable: model.columns().filter(|f| f.filterable).cloned().collect(),
            sortable,
            scope,
            related: HashMap::new(),
        }
    }

    /// Make `models` known, so advanced-search specs reaching into their collections
    /// through relations are checked against their columns too.
    pub fn link(&mut self, models: &[ModelDescription]) {
        for model in models {
            self.related.insert(model.collection(), FieldScope::of(model));
        }
    }

    /// Names of the optional per-field filter parameters
    pub fn filter_fields(&self) -> impl Iterator<Item = &str> {
        self.filterable.iter().map(|f| f.name.as_str())
    }

    /// Validate a list request against this model.
    ///
    /// # Errors
    ///
    /// Returns every problem: limits outside 1-100, unknown or non-filterable
    /// fields, non-sortable order keys, badly typed filter values.
    pub fn validate(&self, mut request: ListRequest) -> Result<ListParams, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filters = std::mem::take(&mut request.filters);

        let mut conditions = BTreeMap::new();
        for (key, value) in filters {
            let Some(field) = self.filterable.iter().find(|f| f.name == key) else {
                errors.push(key.as_str(), "not a filterable field");
                continue;
            };
            match self.filter_condition(field, value) {
                Ok(condition) => {
                    conditions.insert(key, condition);
                }
                Err(e) => errors.add(e),
            }
        }

        let mut params = request.into_params_with(&mut errors);

        if let Some(specs) = &params.advanced_search {
            for spec in specs {
                self.check_spec(&self.scope, "", spec, &mut errors);
            }
        }
        if let Some(order_by) = &params.order_by {
            for (field, _) in order_by.iter() {
                if !self.sortable.contains(field) {
                    errors.push("orderBy", format!("field is not sortable: {field}"));
                }
            }
        }

        errors.result()?;
        params.filters = conditions;
        Ok(params)
    }

    /// Relations into collections that were never linked are accepted unchecked.
    fn check_spec(&self, scope: &FieldScope, prefix: &str, spec: &FilterSpec, errors: &mut ValidationErrors) {
        let unknown = |errors: &mut ValidationErrors| {
            errors.push("advancedSearch", format!("unknown field: {prefix}{}", spec.target()));
        };
        let mut scope = scope;
        for relation in spec.relation_path() {
            let Some(target) = scope.relations.get(relation) else {
                return unknown(errors);
            };
            match self.related.get(target) {
                Some(next) => scope = next,
                None => return,
            }
        }
        match spec.operation() {
            Operation::Some(nested) | Operation::Every(nested) | Operation::None(nested) => {
                let Some(target) = scope.relations.get(spec.field()) else {
                    return unknown(errors);
                };
                if let Some(next) = self.related.get(target) {
                    let prefix = format!("{prefix}{}.", spec.target());
                    for inner in nested {
                        self.check_spec(next, &prefix, inner, errors);
                    }
                }
            }
            _ if scope.knows(spec.field()) => {}
            _ => unknown(errors),
        }
    }

    fn filter_condition(&self, field: &FieldDescription, value: Value) -> Result<Where, ValidationError> {
        let name = field.name.as_str();
        let value = match value {
            Value::String(s)
                if (field.ty.is_ordered() || matches!(field.ty, FieldType::Enum(_)))
                    && (s.starts_with('{') || s.starts_with('[')) =>
            {
                serde_json::from_str(&s)
                    .map_err(|e| ValidationError::new(name, format!("invalid filter JSON: {e}")))?
            }
            other => other,
        };

        match value {
            Value::Null => Ok(Where::is_null(name)),
            Value::Object(range) => {
                if !field.ty.is_ordered() {
                    return Err(ValidationError::new(name, "range filters need a numeric or date field"));
                }
                let mut conditions = Vec::new();
                for (op, bound) in range {
                    let bound = coerce(field, bound);
                    check_value(field, &bound)?;
                    let condition = match op.as_str() {
                        "gte" => FieldCondition::Gte(bound),
                        "lte" => FieldCondition::Lte(bound),
                        "gt" => FieldCondition::Gt(bound),
                        "lt" => FieldCondition::Lt(bound),
                        other => {
                            return Err(ValidationError::new(name, format!("unknown range operator: {other}")));
                        }
                    };
                    conditions.push(Where::field(name, condition));
                }
                Ok(Where::and(conditions))
            }
            Value::Array(options) => {
                if !matches!(field.ty, FieldType::Enum(_)) {
                    return Err(ValidationError::new(name, "list filters need an enum field"));
                }
                for option in &options {
                    check_value(field, option)?;
                }
                Ok(Where::field(name, FieldCondition::In(options)))
            }
            scalar => {
                let scalar = coerce(field, scalar);
                check_value(field, &scalar)?;
                Ok(Where::eq(name, scalar))
            }
        }
    }
}

/// Every schema derived for one model.
#[derive(Debug, Clone)]
pub struct ModelSchemas {
    pub create: CreateSchema,
    pub update: UpdateSchema,
    pub list: ListSchema,
    pub get: IdSchema,
    pub delete: IdSchema,
}

impl ModelSchemas {
    #[must_use]
    pub fn derive(model: &ModelDescription) -> Self {
        Self {
            create: CreateSchema::new(model),
            update: UpdateSchema::new(model),
            list: ListSchema::new(model),
            get: IdSchema::new(model),
            delete: IdSchema::new(model),
        }
    }
}
