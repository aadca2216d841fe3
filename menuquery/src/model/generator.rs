//! `generate(description)`: one static [`ModelDescription`] in, one [`GeneratedModel`]
//! bundle out.
//!
//! Generation is pure and runs once per model while the application is composed.
//! An inconsistent description fails here rather than on the first request.
//!
//! ```rust,ignore
//! let stores = generate(catalog::store())?;
//! let app = Router::new().nest("/stores", stores.router(storage.clone(), Arc::new(RoleAccess)));
//! ```

use axum::Router;
use std::sync::Arc;
use utoipa::openapi::schema::{ArrayBuilder, KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type};
use utoipa::openapi::{Components, RefOr};

use super::description::{CREATED_AT, DELETED_AT, FieldDescription, FieldType, ModelDescription, UPDATED_AT};
use super::router;
use super::schema::ModelSchemas;
use super::service::{ModelService, QuerySpec};
use crate::access::AccessControl;
use crate::config::QueryConfig;
use crate::errors::ApiError;
use crate::query::QueryBuilder;
use crate::storage::{RelationKind, Storage};

/// # Errors
///
/// Returns `ValidationFailed` listing every inconsistency in `description`.
pub fn generate(description: ModelDescription) -> Result<GeneratedModel, ApiError> {
    if let Err(errors) = description.validate() {
        tracing::error!(model = %description.name, errors = %errors, "invalid model description");
        return Err(errors.into());
    }
    let schemas = ModelSchemas::derive(&description);
    let query_spec = QuerySpec::from_description(&description);
    let types = ModelTypes::derive(&description);
    tracing::debug!(model = %description.name, collection = %query_spec.collection, "generated model");

    Ok(GeneratedModel {
        description: Arc::new(description),
        schemas: Arc::new(schemas),
        query_spec: Arc::new(query_spec),
        types,
    })
}

/// [`generate`] for a set of related models, each linked to all the others so list
/// requests filtering through a relation are validated against the target model.
///
/// # Errors
///
/// Returns the first description's `ValidationFailed`.
pub fn generate_all(descriptions: Vec<ModelDescription>) -> Result<Vec<GeneratedModel>, ApiError> {
    let mut models = Vec::with_capacity(descriptions.len());
    for description in &descriptions {
        models.push(generate(description.clone())?.link(&descriptions));
    }
    Ok(models)
}

/// Everything derived from one model description.
#[derive(Debug, Clone)]
pub struct GeneratedModel {
    description: Arc<ModelDescription>,
    schemas: Arc<ModelSchemas>,
    query_spec: Arc<QuerySpec>,
    types: ModelTypes,
}

impl GeneratedModel {
    #[must_use]
    pub fn description(&self) -> &ModelDescription {
        &self.description
    }

    #[must_use]
    pub fn schemas(&self) -> &ModelSchemas {
        &self.schemas
    }

    #[must_use]
    pub fn query_spec(&self) -> &QuerySpec {
        &self.query_spec
    }

    #[must_use]
    pub fn types(&self) -> &ModelTypes {
        &self.types
    }

    /// Validate advanced-search specs that reach into `models` through relations.
    #[must_use]
    pub fn link(mut self, models: &[ModelDescription]) -> Self {
        Arc::make_mut(&mut self.schemas).list.link(models);
        self
    }

    /// Page-size defaults and limits for every read of this model.
    #[must_use]
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        Arc::make_mut(&mut self.query_spec).config = config.normalized();
        self
    }

    /// The CRUD handler set bound to a storage handle and an access collaborator.
    #[must_use]
    pub fn service(&self, storage: Arc<dyn Storage>, access: Arc<dyn AccessControl>) -> ModelService {
        ModelService::new(
            Arc::clone(&self.description),
            Arc::clone(&self.schemas),
            Arc::clone(&self.query_spec),
            storage,
            access,
        )
    }

    #[must_use]
    pub fn router(&self, storage: Arc<dyn Storage>, access: Arc<dyn AccessControl>) -> Router {
        router::router(self.service(storage, access))
    }

    /// A builder preconfigured with this model's base filters, includes and order.
    #[must_use]
    pub fn query<'a>(&self, storage: &'a dyn Storage) -> QueryBuilder<'a> {
        self.query_spec.builder(storage)
    }
}

/// OpenAPI schemas of the entity and its write inputs.
#[derive(Debug, Clone)]
pub struct ModelTypes {
    pub entity_name: String,
    pub entity: Schema,
    pub create: Schema,
    pub update: Schema,
}

impl ModelTypes {
    #[must_use]
    pub fn derive(model: &ModelDescription) -> Self {
        let entity_name = type_name(&model.name);

        let mut entity = ObjectBuilder::new()
            .schema_type(Type::Object)
            .title(Some(entity_name.clone()))
            .description(Some(model.description.clone()))
            .property(&model.primary_key, uuid_schema())
            .required(&model.primary_key);
        if model.timestamps {
            entity = entity
                .property(CREATED_AT, date_time_schema())
                .property(UPDATED_AT, date_time_schema())
                .required(CREATED_AT)
                .required(UPDATED_AT);
        }
        if model.soft_delete {
            entity = entity.property(DELETED_AT, date_time_schema());
        }

        let mut create = ObjectBuilder::new()
            .schema_type(Type::Object)
            .title(Some(format!("{entity_name}Create")));
        let mut update = ObjectBuilder::new()
            .schema_type(Type::Object)
            .title(Some(format!("{entity_name}Update")))
            .property(&model.primary_key, uuid_schema())
            .required(&model.primary_key);

        for field in &model.fields {
            if let Some(binding) = &field.relation {
                let related = ObjectBuilder::new().schema_type(Type::Object);
                entity = match binding.kind {
                    RelationKind::One => entity.property(&field.name, related),
                    RelationKind::Many => entity.property(&field.name, ArrayBuilder::new().items(related)),
                };
                continue;
            }
            entity = entity.property(&field.name, field_schema(field));
            create = create.property(&field.name, field_schema(field));
            update = update.property(&field.name, field_schema(field));
            if field.required {
                entity = entity.required(&field.name);
                if field.default.is_none() {
                    create = create.required(&field.name);
                }
            }
        }

        Self {
            entity_name,
            entity: Schema::Object(entity.build()),
            create: Schema::Object(create.build()),
            update: Schema::Object(update.build()),
        }
    }

    /// Add the three schemas to an OpenAPI document's components.
    pub fn register(&self, components: &mut Components) {
        for (suffix, schema) in [("", &self.entity), ("Create", &self.create), ("Update", &self.update)] {
            components
                .schemas
                .insert(format!("{}{suffix}", self.entity_name), RefOr::T(schema.clone()));
        }
    }
}

/// `menuItem` -> `MenuItem`
fn type_name(name: &str) -> String {
    let mut chars = name.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

fn uuid_schema() -> ObjectBuilder {
    ObjectBuilder::new()
        .schema_type(Type::String)
        .format(Some(SchemaFormat::Custom("uuid".to_string())))
}

fn date_time_schema() -> ObjectBuilder {
    ObjectBuilder::new()
        .schema_type(Type::String)
        .format(Some(SchemaFormat::KnownFormat(KnownFormat::DateTime)))
}

fn field_schema(field: &FieldDescription) -> ObjectBuilder {
    let bounds = &field.bounds;
    let builder = match &field.ty {
        FieldType::String | FieldType::Text => ObjectBuilder::new()
            .schema_type(Type::String)
            .min_length(bounds.min_length)
            .max_length(bounds.max_length)
            .pattern(bounds.pattern.clone())
            .enum_values(bounds.one_of.clone()),
        FieldType::Email => ObjectBuilder::new()
            .schema_type(Type::String)
            .format(Some(SchemaFormat::Custom("email".to_string())))
            .max_length(bounds.max_length),
        FieldType::Int => ObjectBuilder::new()
            .schema_type(Type::Integer)
            .minimum(bounds.min)
            .maximum(bounds.max),
        FieldType::Float => ObjectBuilder::new()
            .schema_type(Type::Number)
            .minimum(bounds.min)
            .maximum(bounds.max),
        FieldType::Boolean => ObjectBuilder::new().schema_type(Type::Boolean),
        FieldType::DateTime => date_time_schema(),
        FieldType::Uuid => uuid_schema(),
        FieldType::Enum(values) => ObjectBuilder::new()
            .schema_type(Type::String)
            .enum_values(Some(values.clone())),
        FieldType::Json | FieldType::Relation => ObjectBuilder::new().schema_type(SchemaType::AnyValue),
    };
    match &field.default {
        Some(default) => builder.default(Some(default.clone())),
        None => builder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::description::{FieldDescription, RelationBinding};
    use serde_json::json;

    fn menu_item() -> ModelDescription {
        ModelDescription::new("menuItem")
            .soft_delete()
            .field(FieldDescription::new("title", FieldType::String).required().length(Some(1), Some(80)))
            .field(FieldDescription::new("price", FieldType::Float).required().range(Some(0.0), None))
            .field(FieldDescription::new("available", FieldType::Boolean).required().default_value(true))
            .field(FieldDescription::relation("category", RelationBinding::belongs_to("categories", "categoryId")))
    }

    #[test]
    fn test_invalid_description_fails_eagerly() {
        let model = ModelDescription::new("store").field(FieldDescription::new("user", FieldType::Relation));
        match generate(model) {
            Err(ApiError::ValidationFailed { errors }) => assert_eq!(errors[0].field, "user"),
            other => panic!("expected a validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_config_reaches_query_spec() {
        let config = QueryConfig {
            default_limit: 250,
            ..QueryConfig::default()
        };
        let generated = generate(menu_item()).unwrap().with_config(config);
        assert_eq!(generated.query_spec().config.default_limit, 100);
    }

    #[test]
    fn test_generate_all_links_relations() {
        let category = ModelDescription::new("category")
            .plural("categories")
            .field(FieldDescription::new("title", FieldType::String));
        let models = generate_all(vec![menu_item(), category]).unwrap();
        let request: crate::ListRequest = serde_json::from_value(json!({
            "advancedSearch": [{ "field": "colour", "value": "red", "operation": "eq", "relation": "category" }]
        }))
        .unwrap();
        let errors = models[0].schemas().list.validate(request.clone()).unwrap_err();
        assert!(errors.has_field("advancedSearch"));

        let unlinked = generate(menu_item()).unwrap();
        assert!(unlinked.schemas().list.validate(request).is_ok());
    }

    #[test]
    fn test_generated_bundle() {
        let generated = generate(menu_item()).unwrap();
        assert_eq!(generated.query_spec().collection, "menuItems");
        assert_eq!(generated.types().entity_name, "MenuItem");

        let entity = serde_json::to_value(&generated.types().entity).unwrap();
        assert_eq!(entity["properties"]["id"]["format"], json!("uuid"));
        assert_eq!(entity["properties"]["category"]["type"], json!("object"));
        assert!(entity["properties"].get("deletedAt").is_some());

        let create = serde_json::to_value(&generated.types().create).unwrap();
        assert_eq!(create["required"], json!(["title", "price"]));
        assert!(create["properties"].get("category").is_none());

        let mut components = Components::default();
        generated.types().register(&mut components);
        assert!(components.schemas.contains_key("MenuItemUpdate"));
    }
}
