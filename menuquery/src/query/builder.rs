use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::QueryConfig;
use crate::errors::ApiError;
use crate::filtering::{
    FieldCondition, FilterSpec, MatchMode, OrderBy, Paginated, TextOp, Where, clamp_limit, compile,
    compile_all,
};
use crate::storage::{self, FindMany, IncludeMap, Projection, Row, Storage};
use crate::validation::{ValidationError, validators::validate_identifier};

/// Which of the two search modes is active. Setting one replaces the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchMode {
    #[default]
    None,
    /// Case-insensitive substring match OR-combined over `fields`
    Text { term: String, fields: Vec<String> },
    /// AND-combined advanced filter list
    Advanced(Vec<FilterSpec>),
}

/// Fluent, single-owner accumulator for one paginated list query.
///
/// ```rust,ignore
/// let page = QueryBuilder::new(&store, "stores")
///     .base_filter("deletedAt", Where::is_null("deletedAt"))
///     .search_text("cafe", ["title"])
///     .paginate(Some(20), None)
///     .execute::<Store>()
///     .await?;
/// ```
pub struct QueryBuilder<'a> {
    storage: &'a dyn Storage,
    collection: String,
    limit: Option<u64>,
    offset: u64,
    order_by: OrderBy,
    search: SearchMode,
    /// Always AND-ed; `filter*` calls never replace these
    base: BTreeMap<String, Where>,
    filters: BTreeMap<String, Where>,
    projection: Projection,
    projection_conflict: bool,
    errors: Vec<ValidationError>,
    config: QueryConfig,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(storage: &'a dyn Storage, collection: impl Into<String>) -> Self {
        Self {
            storage,
            collection: collection.into(),
            limit: None,
            offset: 0,
            order_by: OrderBy::default(),
            search: SearchMode::None,
            base: BTreeMap::new(),
            filters: BTreeMap::new(),
            projection: Projection::All,
            projection_conflict: false,
            errors: Vec::new(),
            config: QueryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config.normalized();
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// `limit` is clamped at execution, not here. `None` keeps the current value.
    #[must_use]
    pub fn paginate(mut self, limit: Option<u64>, offset: Option<u64>) -> Self {
        if limit.is_some() {
            self.limit = limit;
        }
        if let Some(offset) = offset {
            self.offset = offset;
        }
        self
    }

    /// Merge equality filters; a later value for the same field wins. `null` is IS NULL.
    #[must_use]
    pub fn filter<I, K, V>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (field, value) in filters {
            let field = field.into();
            if let Err(e) = validate_identifier("filter", &field) {
                self.errors.push(e);
                continue;
            }
            let condition = Where::eq(field.clone(), value.into());
            self.filters.insert(field, condition);
        }
        self
    }

    /// Merge one pinned-operator filter, keyed by its target like [`filter`](Self::filter).
    /// Compilation errors surface from `execute`.
    #[must_use]
    pub fn constrain(mut self, spec: FilterSpec) -> Self {
        match compile(&spec) {
            Ok(condition) => {
                self.filters.insert(spec.target(), condition);
            }
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Merge an arbitrary condition under `key`.
    #[must_use]
    pub fn filter_where(mut self, key: impl Into<String>, condition: Where) -> Self {
        self.filters.insert(key.into(), condition);
        self
    }

    /// Add a condition every read of this builder keeps, e.g. soft-delete exclusion.
    /// Keys live apart from request filters, so a request filter on the same field
    /// is AND-ed with it instead of replacing it.
    #[must_use]
    pub fn base_filter(mut self, key: impl Into<String>, condition: Where) -> Self {
        self.base.insert(key.into(), condition);
        self
    }

    /// Switch to advanced search, discarding any free-text search.
    #[must_use]
    pub fn search(mut self, specs: Vec<FilterSpec>) -> Self {
        self.search = SearchMode::Advanced(specs);
        self
    }

    /// Switch to legacy free-text search, discarding any advanced filters.
    ///
    /// Dotted field names (`store.title`) match through to-one relations.
    #[must_use]
    pub fn search_text<I, S>(mut self, term: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = SearchMode::Text {
            term: term.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        };
        self
    }

    #[must_use]
    pub fn search_mode(&self) -> &SearchMode {
        &self.search
    }

    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Replace the include map. Rejected at execution if `select` is active.
    #[must_use]
    pub fn include(mut self, includes: IncludeMap) -> Self {
        if matches!(self.projection, Projection::Select(_)) {
            self.projection_conflict = true;
        }
        self.projection = Projection::Include(includes);
        self
    }

    /// Replace the column projection. Rejected at execution if `include` is active.
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if matches!(self.projection, Projection::Include(_)) {
            self.projection_conflict = true;
        }
        self.projection = Projection::Select(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Drop any include or select, allowing the other to be set afterwards.
    #[must_use]
    pub fn clear_projection(mut self) -> Self {
        self.projection = Projection::All;
        self.projection_conflict = false;
        self
    }

    /// The `where` clause `execute` would run.
    ///
    /// # Errors
    ///
    /// Returns the first validation error recorded by `filter` / `constrain`, or one
    /// raised while compiling the search.
    pub fn build_where(&self) -> Result<Where, ValidationError> {
        if let Some(error) = self.errors.first() {
            return Err(error.clone());
        }
        let mut conditions: Vec<Where> = self.base.values().chain(self.filters.values()).cloned().collect();
        match &self.search {
            SearchMode::None => {}
            SearchMode::Text { term, fields } => {
                if let Some(condition) = text_search(term, fields)? {
                    conditions.push(condition);
                }
            }
            SearchMode::Advanced(specs) => conditions.push(compile_all(specs)?),
        }
        Ok(Where::and(conditions))
    }

    /// Run the list and count queries concurrently and assemble the envelope.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` for malformed filters, `BadRequest` for a combined
    /// include and select, `Database` for any storage failure.
    pub async fn execute_rows(self) -> Result<Paginated<Row>, ApiError> {
        if self.projection_conflict {
            return Err(ApiError::bad_request(
                "include and select cannot be combined; clear one before setting the other",
            ));
        }
        let filter = self.build_where()?;
        let limit = clamp_limit(
            self.limit.unwrap_or(self.config.default_limit),
            self.config.max_limit,
        );
        let order_by = if self.order_by.is_empty() {
            OrderBy::newest_first()
        } else {
            self.order_by
        };
        tracing::debug!(
            collection = %self.collection,
            limit,
            offset = self.offset,
            filter = %filter.to_json(),
            "executing list query"
        );

        let args = FindMany {
            filter: filter.clone(),
            order_by,
            take: Some(limit),
            skip: self.offset,
            columns: None,
        };
        let (rows, total_count) = tokio::try_join!(
            storage::find(self.storage, &self.collection, args, &self.projection),
            self.storage.count(&self.collection, &filter),
        )?;

        tracing::debug!(collection = %self.collection, total_count, returned = rows.len(), "list query done");
        Ok(Paginated::new(rows, limit, self.offset, total_count))
    }

    /// [`execute_rows`](Self::execute_rows), decoding every row into `T`.
    ///
    /// # Errors
    ///
    /// As `execute_rows`, plus `Internal` when a row does not decode.
    pub async fn execute<T: DeserializeOwned>(self) -> Result<Paginated<T>, ApiError> {
        let collection = self.collection.clone();
        self.execute_rows().await?.try_map(|row| {
            serde_json::from_value(Value::Object(row)).map_err(|e| {
                ApiError::internal(format!("Failed to decode {collection} row"), Some(e.to_string()))
            })
        })
    }
}

fn text_search(term: &str, fields: &[String]) -> Result<Option<Where>, ValidationError> {
    let term = term.trim();
    if term.is_empty() || fields.is_empty() {
        return Ok(None);
    }
    let mut matches = Vec::with_capacity(fields.len());
    for path in fields {
        let mut segments: Vec<String> = path.split('.').map(str::to_string).collect();
        for segment in &segments {
            validate_identifier("searchFields", segment)?;
        }
        let field = segments.pop().unwrap_or_default();
        let condition = Where::field(
            field,
            FieldCondition::Text {
                op: TextOp::Contains,
                value: term.to_string(),
                mode: MatchMode::Insensitive,
                negated: false,
            },
        );
        matches.push(condition.nested_under(&segments));
    }
    Ok(Some(Where::or(matches)))
}
