use serde_json::Value;

use super::{created_between, not_deleted};
use crate::filtering::{OrderBy, SortOrder};
use crate::storage::{IncludeMap, IncludeSpec};

entity_query!(
    /// Menu categories, excluding soft-deleted ones.
    CategoryQuery,
    collection = "categories",
    soft_delete = true,
    model = crate::catalog::category
);

impl CategoryQuery<'_> {
    #[must_use]
    pub fn by_store(self, store_id: &str) -> Self {
        self.filter([("storeId", store_id)])
    }

    #[must_use]
    pub fn by_active_status(self, active: bool) -> Self {
        self.filter([("active", active)])
    }

    #[must_use]
    pub fn by_created_date_range(self, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.constrain(created_between(from, to))
    }

    /// Owning store summary and live items in menu order.
    #[must_use]
    pub fn with_relations(self) -> Self {
        let items = IncludeSpec::all()
            .filter(not_deleted())
            .order_by(OrderBy::by("position", SortOrder::Asc));
        self.include(IncludeMap::from([
            ("store".to_string(), IncludeSpec::all().select(["id", "title", "slug"])),
            ("items".to_string(), items),
        ]))
    }
}
