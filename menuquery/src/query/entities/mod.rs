//! Per-collection query builders.
//!
//! Every named filter is sugar for exactly one [`QueryBuilder::filter`](crate::query::QueryBuilder::filter) or
//! [`QueryBuilder::constrain`](crate::query::QueryBuilder::constrain) call; the generic builder alone is enough for
//! correctness. Collections with soft-delete semantics exclude rows whose
//! `deletedAt` is set from construction on.

use serde_json::Value;

use crate::filtering::{FilterSpec, Operation};

/// Declares an entity builder wrapping `QueryBuilder` and forwarding its fluent API.
macro_rules! entity_query {
    (
        $(#[$meta:meta])* $name:ident,
        collection = $collection:literal,
        soft_delete = $soft:literal,
        model = $model:path
    ) => {
        $(#[$meta])*
        pub struct $name<'a> {
            inner: $crate::query::QueryBuilder<'a>,
        }

        impl<'a> $name<'a> {
            pub const COLLECTION: &'static str = $collection;

            pub fn new(storage: &'a dyn $crate::storage::Storage) -> Self {
                let inner = $crate::query::QueryBuilder::new(storage, $collection);
                let inner = if $soft {
                    inner.base_filter("deletedAt", $crate::filtering::Where::is_null("deletedAt"))
                } else {
                    inner
                };
                Self { inner }
            }

            /// The catalog description of this collection.
            #[must_use]
            pub fn description() -> $crate::model::ModelDescription {
                $model()
            }

            /// Validate a list request against [`description`](Self::description),
            /// converting query-string values to each field's type.
            ///
            /// # Errors
            ///
            /// Returns every problem found in the request.
            pub fn params(
                request: $crate::list_endpoint::ListRequest,
            ) -> Result<$crate::list_endpoint::ListParams, $crate::validation::ValidationErrors> {
                request.into_params_for(&Self::description())
            }

            fn map(
                self,
                f: impl FnOnce($crate::query::QueryBuilder<'a>) -> $crate::query::QueryBuilder<'a>,
            ) -> Self {
                Self { inner: f(self.inner) }
            }

            #[must_use]
            pub fn with_config(self, config: $crate::config::QueryConfig) -> Self {
                self.map(|q| q.with_config(config))
            }

            #[must_use]
            pub fn paginate(self, limit: Option<u64>, offset: Option<u64>) -> Self {
                self.map(|q| q.paginate(limit, offset))
            }

            #[must_use]
            pub fn filter<I, K, V>(self, filters: I) -> Self
            where
                I: IntoIterator<Item = (K, V)>,
                K: Into<String>,
                V: Into<::serde_json::Value>,
            {
                self.map(|q| q.filter(filters))
            }

            #[must_use]
            pub fn constrain(self, spec: $crate::filtering::FilterSpec) -> Self {
                self.map(|q| q.constrain(spec))
            }

            #[must_use]
            pub fn search(self, specs: Vec<$crate::filtering::FilterSpec>) -> Self {
                self.map(|q| q.search(specs))
            }

            #[must_use]
            pub fn search_text<I, S>(self, term: impl Into<String>, fields: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.map(|q| q.search_text(term, fields))
            }

            #[must_use]
            pub fn order_by(self, order_by: $crate::filtering::OrderBy) -> Self {
                self.map(|q| q.order_by(order_by))
            }

            #[must_use]
            pub fn include(self, includes: $crate::storage::IncludeMap) -> Self {
                self.map(|q| q.include(includes))
            }

            #[must_use]
            pub fn select<I, S>(self, columns: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.map(|q| q.select(columns))
            }

            #[must_use]
            pub fn clear_projection(self) -> Self {
                self.map($crate::query::QueryBuilder::clear_projection)
            }

            /// # Errors
            ///
            /// Same as `QueryBuilder::build_where`.
            pub fn build_where(
                &self,
            ) -> Result<$crate::filtering::Where, $crate::validation::ValidationError> {
                self.inner.build_where()
            }

            /// # Errors
            ///
            /// Same as `QueryBuilder::execute`.
            pub async fn execute<T: ::serde::de::DeserializeOwned>(
                self,
            ) -> Result<$crate::filtering::Paginated<T>, $crate::errors::ApiError> {
                self.inner.execute().await
            }

            /// # Errors
            ///
            /// Same as `QueryBuilder::execute_rows`.
            pub async fn execute_rows(
                self,
            ) -> Result<
                $crate::filtering::Paginated<$crate::storage::Row>,
                $crate::errors::ApiError,
            > {
                self.inner.execute_rows().await
            }

            #[must_use]
            pub fn into_inner(self) -> $crate::query::QueryBuilder<'a> {
                self.inner
            }
        }

        impl<'a> From<$name<'a>> for $crate::query::QueryBuilder<'a> {
            fn from(query: $name<'a>) -> Self {
                query.inner
            }
        }
    };
}

mod category;
mod file;
mod menu_item;
mod store;
mod user;

pub use category::CategoryQuery;
pub use file::FileQuery;
pub use menu_item::MenuItemQuery;
pub use store::StoreQuery;
pub use user::UserQuery;

/// Inclusive `createdAt` range shared by every entity builder.
fn created_between(from: impl Into<Value>, to: impl Into<Value>) -> FilterSpec {
    FilterSpec::between_static("createdAt", from, to)
}

fn pinned(field: &'static str, operation: Operation) -> FilterSpec {
    FilterSpec::fixed(field, operation)
}

/// `IS NULL` on `deletedAt`, for the builder's own rows and included relations.
fn not_deleted() -> crate::filtering::Where {
    crate::filtering::Where::is_null("deletedAt")
}
