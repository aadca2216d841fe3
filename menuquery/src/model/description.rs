//! Static model descriptions.
//!
//! A [`ModelDescription`] is authored once per entity, either through the builder API
//! or as JSON, and never mutated at request time.
//!
//! ```json
//! {
//!   "name": "store",
//!   "namePlural": "stores",
//!   "softDelete": true,
//!   "fields": [
//!     { "name": "title", "type": "string", "required": true, "searchable": true,
//!       "bounds": { "minLength": 2, "maxLength": 100 } },
//!     { "name": "user", "type": "relation",
//!       "relation": { "model": "users", "localKey": "userId", "kind": "one" } }
//!   ],
//!   "permissions": { "delete": ["admin"] }
//! }
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::filtering::OrderBy;
use crate::storage::{RelationDef, RelationKind, Relations};
use crate::validation::{ValidationErrors, validators::validate_identifier};

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub use crate::storage::DELETED_AT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Email,
    Int,
    Float,
    Boolean,
    DateTime,
    Uuid,
    /// Closed set of string values
    Enum(Vec<String>),
    Json,
    /// Not a column; names a relation usable in filters and includes
    Relation,
}

impl FieldType {
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Text | Self::Email | Self::Uuid | Self::Enum(_))
    }

    /// Types whose list filters accept a `{gte, lte, gt, lt}` range object
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::DateTime)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub one_of: Option<Vec<String>>,
}

/// How a relation-typed field joins to its target collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationBinding {
    /// Target collection
    pub model: String,
    #[serde(default = "default_key")]
    pub local_key: String,
    #[serde(default = "default_key")]
    pub remote_key: String,
    pub kind: RelationKind,
}

fn default_key() -> String {
    "id".to_string()
}

impl RelationBinding {
    /// This collection's `local_key` references `model.id`.
    #[must_use]
    pub fn belongs_to(model: &str, local_key: &str) -> Self {
        Self {
            model: model.to_string(),
            local_key: local_key.to_string(),
            remote_key: default_key(),
            kind: RelationKind::One,
        }
    }

    /// `model.remote_key` references this collection's id.
    #[must_use]
    pub fn has_many(model: &str, remote_key: &str) -> Self {
        Self {
            model: model.to_string(),
            local_key: default_key(),
            remote_key: remote_key.to_string(),
            kind: RelationKind::Many,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub bounds: FieldBounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationBinding>,
    /// Applied on create when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDescription {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            searchable: false,
            filterable: false,
            sortable: false,
            bounds: FieldBounds::default(),
            relation: None,
            default: None,
        }
    }

    pub fn relation(name: impl Into<String>, binding: RelationBinding) -> Self {
        Self {
            relation: Some(binding),
            ..Self::new(name, FieldType::Relation)
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    #[must_use]
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    #[must_use]
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.bounds.min_length = min;
        self.bounds.max_length = max;
        self
    }

    #[must_use]
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.bounds.min = min;
        self.bounds.max = max;
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.bounds.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub const fn is_column(&self) -> bool {
        !matches!(self.ty, FieldType::Relation)
    }
}

/// Roles required per operation; an empty list admits any authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub create: Vec<String>,
    pub get: Vec<String>,
    pub list: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudOperation {
    Create,
    Get,
    List,
    Update,
    Delete,
}

impl CrudOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Permissions {
    #[must_use]
    pub fn roles(&self, operation: CrudOperation) -> &[String] {
        match operation {
            CrudOperation::Create => &self.create,
            CrudOperation::Get => &self.get,
            CrudOperation::List => &self.list,
            CrudOperation::Update => &self.update,
            CrudOperation::Delete => &self.delete,
        }
    }

    /// Same roles for every write operation
    #[must_use]
    pub fn writes<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        self.create.clone_from(&roles);
        self.update.clone_from(&roles);
        self.delete = roles;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescription {
    /// Singular resource name, e.g. `store`
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_plural: Option<String>,
    /// Storage collection; defaults to the plural name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldDescription>,
    #[serde(default)]
    pub soft_delete: bool,
    #[serde(default = "yes")]
    pub timestamps: bool,
    #[serde(default = "default_key")]
    pub primary_key: String,
    /// Equality filters applied to every read
    #[serde(default)]
    pub base_filters: Map<String, Value>,
    /// Relation fields loaded on get and list
    #[serde(default)]
    pub default_includes: Vec<String>,
    #[serde(default)]
    pub default_order: OrderBy,
    #[serde(default)]
    pub permissions: Permissions,
}

const fn yes() -> bool {
    true
}

impl ModelDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_plural: None,
            collection: None,
            description: String::new(),
            fields: Vec::new(),
            soft_delete: false,
            timestamps: true,
            primary_key: default_key(),
            base_filters: Map::new(),
            default_includes: Vec::new(),
            default_order: OrderBy::default(),
            permissions: Permissions::default(),
        }
    }

    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed or mistyped JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn plural(mut self, name_plural: impl Into<String>) -> Self {
        self.name_plural = Some(name_plural.into());
        self
    }

    #[must_use]
    pub fn collection_name(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescription) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }

    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    #[must_use]
    pub fn base_filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.base_filters.insert(field.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn include_by_default(mut self, relation: &str) -> Self {
        self.default_includes.push(relation.to_string());
        self
    }

    #[must_use]
    pub fn order(mut self, order: OrderBy) -> Self {
        self.default_order = order;
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn name_plural(&self) -> String {
        self.name_plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.name))
    }

    #[must_use]
    pub fn collection(&self) -> String {
        self.collection.clone().unwrap_or_else(|| self.name_plural())
    }

    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| f.is_column())
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| !f.is_column())
    }

    /// Columns managed by the engine rather than declared as fields.
    #[must_use]
    pub fn implicit_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.primary_key.as_str()];
        if self.timestamps {
            columns.extend([CREATED_AT, UPDATED_AT]);
        }
        if self.soft_delete {
            columns.push(DELETED_AT);
        }
        columns
    }

    /// Whether `name` is a column of this model, declared or implicit.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.implicit_columns().contains(&name) || self.columns().any(|f| f.name == name)
    }

    #[must_use]
    pub fn is_sortable(&self, name: &str) -> bool {
        self.implicit_columns().contains(&name)
            || self.columns().any(|f| f.name == name && f.sortable)
    }

    /// Check the description is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns every problem found, each keyed by the offending field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validate_identifier("name", &self.name));
        errors.check(validate_identifier("collection", &self.collection()));
        errors.check(validate_identifier("primaryKey", &self.primary_key));

        let implicit = self.implicit_columns();
        let mut seen = HashSet::new();
        for field in &self.fields {
            let name = field.name.as_str();
            errors.check(validate_identifier(name, name));
            if !seen.insert(name) {
                errors.push(name, "duplicate field");
            }
            if implicit.contains(&name) {
                errors.push(name, "field collides with a managed column");
            }
            match (&field.ty, &field.relation) {
                (FieldType::Relation, None) => {
                    errors.push(name, "relation field has no bound model");
                }
                (FieldType::Relation, Some(binding)) => {
                    errors.check(validate_identifier(name, &binding.model));
                    errors.check(validate_identifier(name, &binding.local_key));
                    errors.check(validate_identifier(name, &binding.remote_key));
                    if field.required || field.filterable || field.sortable || field.searchable {
                        errors.push(name, "relation fields cannot be required, filterable, sortable or searchable");
                    }
                }
                (_, Some(_)) => errors.push(name, "only relation fields may carry a relation binding"),
                (FieldType::Enum(values), None) if values.is_empty() => {
                    errors.push(name, "enum field needs at least one value");
                }
                _ => {}
            }
            validate_bounds(field, &mut errors);
        }

        for relation in &self.default_includes {
            if !self.relation_fields().any(|f| &f.name == relation) {
                errors.push("defaultIncludes", format!("unknown relation: {relation}"));
            }
        }
        for field in self.base_filters.keys() {
            if !self.has_column(field) {
                errors.push("baseFilters", format!("unknown column: {field}"));
            }
        }
        for (field, _) in self.default_order.iter() {
            if !self.has_column(field) {
                errors.push("defaultOrder", format!("unknown column: {field}"));
            }
        }
        errors.result()
    }
}

fn validate_bounds(field: &FieldDescription, errors: &mut ValidationErrors) {
    let bounds = &field.bounds;
    let name = field.name.as_str();
    if let (Some(min), Some(max)) = (bounds.min, bounds.max)
        && min > max
    {
        errors.push(name, "min is greater than max");
    }
    if let (Some(min), Some(max)) = (bounds.min_length, bounds.max_length)
        && min > max
    {
        errors.push(name, "minLength is greater than maxLength");
    }
    if let Some(pattern) = &bounds.pattern
        && let Err(e) = Regex::new(pattern)
    {
        errors.push(name, format!("invalid pattern: {e}"));
    }
    if let Some(default) = &field.default
        && let Err(e) = super::schema::check_value(field, default)
    {
        errors.push(name, format!("invalid default: {}", e.message));
    }
}

/// Relation registry for a set of models, keyed by each model's collection.
#[must_use]
pub fn relations_for(models: &[ModelDescription]) -> Relations {
    let mut relations = Relations::new();
    for model in models {
        let collection = model.collection();
        if model.soft_delete {
            relations.mark_soft_delete(&collection);
        }
        for field in model.relation_fields() {
            if let Some(binding) = &field.relation {
                relations.add(
                    &collection,
                    RelationDef {
                        name: field.name.clone(),
                        target: binding.model.clone(),
                        local_key: binding.local_key.clone(),
                        remote_key: binding.remote_key.clone(),
                        kind: binding.kind,
                    },
                );
            }
        }
    }
    relations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_applies_defaults() {
        let model = ModelDescription::from_json(
            r#"{
                "name": "store",
                "fields": [
                    { "name": "title", "type": "string", "required": true },
                    { "name": "tier", "type": { "enum": ["free", "pro"] } },
                    { "name": "user", "type": "relation",
                      "relation": { "model": "users", "localKey": "userId", "kind": "one" } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(model.collection(), "stores");
        assert!(model.timestamps);
        assert_eq!(model.primary_key, "id");
        assert_eq!(model.fields[1].ty, FieldType::Enum(vec!["free".into(), "pro".into()]));
        assert_eq!(model.fields[2].relation.as_ref().unwrap().remote_key, "id");
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_relation_without_binding_is_invalid() {
        let model = ModelDescription::new("store").field(FieldDescription::new("user", FieldType::Relation));
        let errors = model.validate().unwrap_err();
        assert!(errors.has_field("user"));
    }

    #[test]
    fn test_duplicates_and_bad_bounds() {
        let model = ModelDescription::new("item")
            .field(FieldDescription::new("price", FieldType::Float).range(Some(10.0), Some(1.0)))
            .field(FieldDescription::new("price", FieldType::Float))
            .field(FieldDescription::new("createdAt", FieldType::DateTime))
            .field(FieldDescription::new("code", FieldType::String).pattern("("));
        let errors = model.validate().unwrap_err();
        assert!(errors.len() >= 4);
        assert!(errors.has_field("createdAt"));
        assert!(errors.has_field("code"));
    }

    #[test]
    fn test_relations_for_models() {
        let store = ModelDescription::new("store")
            .field(FieldDescription::relation("branches", RelationBinding::has_many("branches", "storeId")));
        let branch = ModelDescription::new("branch").plural("branches").soft_delete();
        let relations = relations_for(&[store, branch]);
        let def = relations.get("stores", "branches").unwrap();
        assert_eq!(def.remote_key, "storeId");
        assert_eq!(def.kind, RelationKind::Many);
        assert!(relations.is_soft_deleting("branches"));
        assert!(!relations.is_soft_deleting("stores"));
    }

    #[test]
    fn test_unknown_default_include() {
        let model = ModelDescription::new("store").include_by_default("owner");
        assert!(model.validate().unwrap_err().has_field("defaultIncludes"));
    }
}
