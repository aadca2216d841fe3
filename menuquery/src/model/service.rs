//! Data-driven CRUD handlers parameterized over a [`ModelDescription`].

use chrono::Utc;
use sea_orm::{DbErr, SqlErr};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::description::{CREATED_AT, CrudOperation, DELETED_AT, ModelDescription, UPDATED_AT};
use super::schema::ModelSchemas;
use crate::access::{AccessControl, Caller};
use crate::config::QueryConfig;
use crate::errors::ApiError;
use crate::filtering::{OrderBy, Paginated, SortOrder, Where};
use crate::list_endpoint::{ListEndpoint, ListRequest};
use crate::query::QueryBuilder;
use crate::storage::{self, FindMany, IncludeMap, IncludeSpec, Projection, Row, Storage};

/// How reads of one model are configured before any request-specific input.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub collection: String,
    /// Applied to every read; keyed apart from request filters so they cannot be overridden
    pub base_filters: BTreeMap<String, Where>,
    pub includes: IncludeMap,
    pub order_by: OrderBy,
    pub search_fields: Vec<String>,
    pub primary_key: String,
    pub config: QueryConfig,
}

impl QuerySpec {
    #[must_use]
    pub fn from_description(model: &ModelDescription) -> Self {
        let mut base_filters: BTreeMap<String, Where> = model
            .base_filters
            .iter()
            .map(|(field, value)| (field.clone(), Where::eq(field.clone(), value.clone())))
            .collect();
        if model.soft_delete {
            base_filters.insert(DELETED_AT.to_string(), Where::is_null(DELETED_AT));
        }

        let order_by = if !model.default_order.is_empty() {
            model.default_order.clone()
        } else if model.timestamps {
            OrderBy::newest_first()
        } else {
            OrderBy::by(model.primary_key.clone(), SortOrder::Asc)
        };

        Self {
            collection: model.collection(),
            base_filters,
            includes: model
                .default_includes
                .iter()
                .map(|relation| (relation.clone(), IncludeSpec::all()))
                .collect(),
            order_by,
            search_fields: model
                .columns()
                .filter(|f| f.searchable)
                .map(|f| f.name.clone())
                .collect(),
            primary_key: model.primary_key.clone(),
            config: QueryConfig::default(),
        }
    }

    /// A list builder with base filters, default includes and default order applied.
    #[must_use]
    pub fn builder<'a>(&self, storage: &'a dyn Storage) -> QueryBuilder<'a> {
        let mut builder = QueryBuilder::new(storage, self.collection.clone())
            .with_config(self.config.clone())
            .order_by(self.order_by.clone());
        for (key, condition) in &self.base_filters {
            builder = builder.base_filter(key.clone(), condition.clone());
        }
        if !self.includes.is_empty() {
            builder = builder.include(self.includes.clone());
        }
        builder
    }

    /// Base filters AND `primary_key = id`.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Where {
        Where::and(
            self.base_filters
                .values()
                .cloned()
                .chain([Where::eq(self.primary_key.clone(), id)]),
        )
    }

    fn projection(&self) -> Projection {
        if self.includes.is_empty() {
            Projection::All
        } else {
            Projection::Include(self.includes.clone())
        }
    }
}

/// Unique-constraint violations become 409, everything else goes through `From<DbErr>`.
fn write_error(err: DbErr) -> ApiError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return ApiError::conflict(format!("Conflict: {detail}"));
    }
    err.into()
}

/// The generic create/get/list/update/delete handler set of one model.
#[derive(Clone)]
pub struct ModelService {
    model: Arc<ModelDescription>,
    schemas: Arc<ModelSchemas>,
    query: Arc<QuerySpec>,
    storage: Arc<dyn Storage>,
    access: Arc<dyn AccessControl>,
}

impl ModelService {
    pub(crate) fn new(
        model: Arc<ModelDescription>,
        schemas: Arc<ModelSchemas>,
        query: Arc<QuerySpec>,
        storage: Arc<dyn Storage>,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            model,
            schemas,
            query,
            storage,
            access,
        }
    }

    #[must_use]
    pub fn model(&self) -> &ModelDescription {
        &self.model
    }

    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    fn authorize(&self, caller: &Caller, operation: CrudOperation) -> Result<(), ApiError> {
        self.access.check(
            caller,
            &format!("{} {}", operation.as_str(), self.model.name),
            self.model.permissions.roles(operation),
        )
    }

    fn not_found(&self, id: &str) -> ApiError {
        ApiError::not_found(self.model.name.clone(), Some(id.to_string()))
    }

    async fn fetch(&self, id: &str, projection: &Projection) -> Result<Option<Row>, ApiError> {
        let args = FindMany {
            filter: self.query.by_id(id),
            order_by: OrderBy::default(),
            take: Some(1),
            skip: 0,
            columns: None,
        };
        let rows = storage::find(self.storage(), &self.query.collection, args, projection).await?;
        Ok(rows.into_iter().next())
    }

    /// # Errors
    ///
    /// `Forbidden`, `ValidationFailed` for an invalid payload, `Conflict` on a unique
    /// violation, `Database` for any other storage failure.
    pub async fn create(&self, caller: &Caller, input: &Value) -> Result<Row, ApiError> {
        self.authorize(caller, CrudOperation::Create)?;
        let mut row = self.schemas.create.validate(input)?;

        let id = Uuid::new_v4().to_string();
        row.insert(self.model.primary_key.clone(), Value::String(id.clone()));
        if self.model.timestamps {
            let now = Value::String(Utc::now().to_rfc3339());
            row.insert(CREATED_AT.to_string(), now.clone());
            row.insert(UPDATED_AT.to_string(), now);
        }

        let created = self
            .storage
            .insert(&self.query.collection, row)
            .await
            .map_err(write_error)?;
        tracing::info!(model = %self.model.name, id = %id, caller = %caller.id, "created");
        Ok(created)
    }

    /// Soft-deleted rows and rows outside the base filters are `NotFound`.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `NotFound`, `Database`.
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Row, ApiError> {
        self.authorize(caller, CrudOperation::Get)?;
        let id = self.schemas.get.validate(&Value::from(id))?;
        self.fetch(&id, &self.query.projection())
            .await?
            .ok_or_else(|| self.not_found(&id))
    }

    /// Every filterable field is an optional equality or range filter.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `ValidationFailed` for a malformed request, then whatever
    /// `ListEndpoint::run` returns.
    pub async fn list(&self, caller: &Caller, request: ListRequest) -> Result<Paginated<Row>, ApiError> {
        self.authorize(caller, CrudOperation::List)?;
        let params = self.schemas.list.validate(request)?;
        ListEndpoint::new(self.model.name.clone())
            .search_fields(self.query.search_fields.iter().cloned())
            .run(self.query.builder(self.storage()), caller, params)
            .await
    }

    /// The path id wins over any id in the body.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `ValidationFailed`, `NotFound` when the row is absent before the
    /// write, `Conflict`, `Database`.
    pub async fn update(&self, caller: &Caller, id: &str, input: &Value) -> Result<Row, ApiError> {
        self.authorize(caller, CrudOperation::Update)?;
        let mut input = input.clone();
        if let Some(object) = input.as_object_mut() {
            object.insert(self.model.primary_key.clone(), Value::from(id));
        }
        let update = self.schemas.update.validate(&input)?;

        if self.fetch(&update.id, &Projection::All).await?.is_none() {
            return Err(self.not_found(&update.id));
        }

        let mut patch = update.patch;
        if self.model.timestamps {
            patch.insert(UPDATED_AT.to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        if !patch.is_empty() {
            self.storage
                .update_many(&self.query.collection, &self.query.by_id(&update.id), patch)
                .await
                .map_err(write_error)?;
        }
        tracing::info!(model = %self.model.name, id = %update.id, caller = %caller.id, "updated");

        self.fetch(&update.id, &self.query.projection())
            .await?
            .ok_or_else(|| self.not_found(&update.id))
    }

    /// Sets `deletedAt` for soft-deleting models, removes the row otherwise.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `NotFound`, `Database`.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<(), ApiError> {
        self.authorize(caller, CrudOperation::Delete)?;
        let id = self.schemas.delete.validate(&Value::from(id))?;
        if self.fetch(&id, &Projection::All).await?.is_none() {
            return Err(self.not_found(&id));
        }

        let filter = self.query.by_id(&id);
        if self.model.soft_delete {
            let patch = Row::from_iter([(DELETED_AT.to_string(), Value::String(Utc::now().to_rfc3339()))]);
            self.storage.update_many(&self.query.collection, &filter, patch).await?;
        } else {
            self.storage.delete_many(&self.query.collection, &filter).await?;
        }
        tracing::info!(model = %self.model.name, id = %id, soft = self.model.soft_delete, "deleted");
        Ok(())
    }
}
