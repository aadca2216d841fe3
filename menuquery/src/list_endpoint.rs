//! # List Endpoints
//!
//! [`ListEndpoint`] runs any [`QueryBuilder`] against an inbound list request behind a
//! uniform access check. The request arrives as a [`ListRequest`], either from a query
//! string (every value a string) or a JSON body, and is validated into [`ListParams`].
//!
//! ```rust,ignore
//! let endpoint = ListEndpoint::new("stores")
//!     .with_access(Arc::new(RoleAccess), ["admin", "staff"])
//!     .search_fields(["title", "slug"])
//!     .derive_filters(|caller, _| Ok(vec![("userId".into(), Where::eq("userId", caller.id.clone()))]));
//!
//! let page = endpoint
//!     .run(StoreQuery::new(&storage).into(), &caller, StoreQuery::params(request)?)
//!     .await?;
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use serde_with::{DisplayFromStr, PickFirst, json::JsonString, serde_as};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::access::{AccessControl, Caller};
use crate::errors::ApiError;
use crate::filtering::{FilterSpec, MAX_LIMIT, OrderBy, Paginated, Where};
use crate::model::{ListSchema, ModelDescription};
use crate::query::QueryBuilder;
use crate::storage::Row;
use crate::validation::{ValidationErrors, validators::validate_identifier};

/// Caller-facing list request.
///
/// Numbers may arrive as strings and `advancedSearch` / `orderBy` as JSON-encoded
/// strings, so the same type serves `GET ?limit=10&advancedSearch=[...]` and a JSON
/// body. Every other key is collected into `filters`.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub limit: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub offset: Option<u64>,
    pub search: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, JsonString)>>")]
    pub advanced_search: Option<Vec<FilterSpec>>,
    #[serde_as(as = "Option<PickFirst<(_, JsonString)>>")]
    pub order_by: Option<Value>,
    /// REST-style single sort key, used when `orderBy` is absent
    pub sort_by: Option<String>,
    pub order: Option<String>,
    #[serde(flatten)]
    pub filters: Map<String, Value>,
}

impl ListRequest {
    /// Untyped validation: every extra key becomes an equality filter on the value
    /// exactly as given. Suits JSON bodies; a query string carries every value as a
    /// string, so use [`into_params_for`](Self::into_params_for) there.
    ///
    /// # Errors
    ///
    /// Returns every problem found in the request.
    pub fn into_params(self) -> Result<ListParams, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut filters = BTreeMap::new();
        for (field, value) in &self.filters {
            match validate_identifier(field, field) {
                Ok(()) => {
                    filters.insert(field.clone(), Where::eq(field.clone(), value.clone()));
                }
                Err(e) => errors.add(e),
            }
        }
        let mut params = self.into_params_with(&mut errors);
        errors.result()?;
        params.filters = filters;
        Ok(params)
    }

    /// Validation against `model`: query-string values are converted to each field's
    /// type, range and membership filters are accepted, unknown fields are rejected.
    ///
    /// # Errors
    ///
    /// Returns every problem found in the request.
    pub fn into_params_for(self, model: &ModelDescription) -> Result<ListParams, ValidationErrors> {
        ListSchema::new(model).validate(self)
    }

    /// Shared checks for pagination, search and ordering; filters are left empty.
    pub(crate) fn into_params_with(self, errors: &mut ValidationErrors) -> ListParams {
        if let Some(limit) = self.limit
            && !(1..=MAX_LIMIT).contains(&limit)
        {
            errors.push("limit", format!("Must be between 1 and {MAX_LIMIT}"));
        }

        let order_by = match (&self.order_by, &self.sort_by) {
            (Some(value), _) => OrderBy::from_json(value).map(Some),
            (None, Some(sort_by)) => OrderBy::from_pair(sort_by, self.order.as_deref()).map(Some),
            (None, None) => Ok(None),
        };
        let order_by = order_by.unwrap_or_else(|e| {
            errors.add(e);
            None
        });

        ListParams {
            limit: self.limit,
            offset: self.offset,
            search: self.search.filter(|s| !s.trim().is_empty()),
            advanced_search: self.advanced_search.filter(|specs| !specs.is_empty()),
            order_by,
            filters: BTreeMap::new(),
        }
    }
}

/// A validated list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub search: Option<String>,
    pub advanced_search: Option<Vec<FilterSpec>>,
    pub order_by: Option<OrderBy>,
    /// Per-field conditions, keyed by field
    pub filters: BTreeMap<String, Where>,
}

type DeriveFilters =
    Arc<dyn Fn(&Caller, &ListParams) -> Result<Vec<(String, Where)>, ApiError> + Send + Sync>;
type Transform = Arc<dyn Fn(Row) -> Result<Row, ApiError> + Send + Sync>;

#[derive(Clone)]
pub struct ListEndpoint {
    resource: String,
    access: Option<Arc<dyn AccessControl>>,
    required_roles: Vec<String>,
    search_fields: Vec<String>,
    derive_filters: Option<DeriveFilters>,
    transform: Option<Transform>,
}

impl ListEndpoint {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            access: None,
            required_roles: Vec::new(),
            search_fields: Vec::new(),
            derive_filters: None,
            transform: None,
        }
    }

    /// Check `roles` with `access` before anything else runs.
    #[must_use]
    pub fn with_access<I, S>(mut self, access: Arc<dyn AccessControl>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access = Some(access);
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Fields matched by legacy free-text search
    #[must_use]
    pub fn search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Extra conditions computed from the caller and the request, e.g. ownership.
    #[must_use]
    pub fn derive_filters(
        mut self,
        derive: impl Fn(&Caller, &ListParams) -> Result<Vec<(String, Where)>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.derive_filters = Some(Arc::new(derive));
        self
    }

    /// Post-process every returned row.
    #[must_use]
    pub fn transform(
        mut self,
        transform: impl Fn(Row) -> Result<Row, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Access check, search (advanced over legacy), derived filters, execute, transform.
    ///
    /// # Errors
    ///
    /// `Forbidden` from the access check, then anything `QueryBuilder::execute_rows`
    /// or the transform returns.
    pub async fn run(
        &self,
        builder: QueryBuilder<'_>,
        caller: &Caller,
        params: ListParams,
    ) -> Result<Paginated<Row>, ApiError> {
        if let Some(access) = &self.access {
            access.check(caller, &format!("list {}", self.resource), &self.required_roles)?;
        }
        let derived = match &self.derive_filters {
            Some(derive) => derive(caller, &params)?,
            None => Vec::new(),
        };

        let mut builder = builder.paginate(params.limit, params.offset);
        if let Some(order_by) = params.order_by {
            builder = builder.order_by(order_by);
        }
        for (key, condition) in params.filters.into_iter().chain(derived) {
            builder = builder.filter_where(key, condition);
        }
        builder = match (params.advanced_search, params.search) {
            (Some(specs), _) => builder.search(specs),
            (None, Some(term)) => builder.search_text(term, self.search_fields.iter().cloned()),
            (None, None) => builder,
        };

        tracing::debug!(resource = %self.resource, caller = %caller.id, "running list endpoint");
        let page = builder.execute_rows().await?;
        match &self.transform {
            Some(transform) => page.try_map(|row| transform(row)),
            None => Ok(page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_string_form() {
        let request: ListRequest = serde_json::from_value(json!({
            "limit": "20",
            "offset": "40",
            "advancedSearch": "[{\"field\":\"active\",\"value\":true,\"operation\":\"eq\"}]",
            "orderBy": "{\"title\":\"asc\"}",
            "active": "true"
        }))
        .unwrap();
        assert_eq!(request.limit, Some(20));
        assert_eq!(request.offset, Some(40));
        assert_eq!(request.advanced_search.as_ref().unwrap().len(), 1);
        assert_eq!(request.order_by, Some(json!({ "title": "asc" })));
        assert_eq!(request.filters.get("active"), Some(&json!("true")));
    }

    #[test]
    fn test_json_body_form() {
        let request: ListRequest = serde_json::from_value(json!({
            "limit": 5,
            "advancedSearch": [{ "field": "price", "value": [1, 2], "operation": "between" }],
            "sortBy": "price",
            "order": "desc"
        }))
        .unwrap();
        let params = request.into_params().unwrap();
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.order_by, Some(OrderBy::by("price", crate::filtering::SortOrder::Desc)));
    }

    #[test]
    fn test_limit_out_of_range_is_rejected() {
        let request = ListRequest {
            limit: Some(500),
            ..ListRequest::default()
        };
        let errors = request.into_params().unwrap_err();
        assert!(errors.has_field("limit"));

        let zero = ListRequest {
            limit: Some(0),
            ..ListRequest::default()
        };
        assert!(zero.into_params().is_err());
    }

    #[test]
    fn test_malformed_between_is_rejected_at_parse() {
        let result = serde_json::from_value::<ListRequest>(json!({
            "advancedSearch": [{ "field": "price", "value": [1, 2, 3], "operation": "between" }]
        }));
        assert!(result.is_err());
    }
}
