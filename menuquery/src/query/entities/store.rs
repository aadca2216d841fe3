use serde_json::Value;

use super::{created_between, not_deleted};
use crate::filtering::{OrderBy, SortOrder, Where};
use crate::storage::{IncludeMap, IncludeSpec};

entity_query!(
    /// Stores, excluding soft-deleted ones.
    StoreQuery,
    collection = "stores",
    soft_delete = true,
    model = crate::catalog::store
);

impl StoreQuery<'_> {
    #[must_use]
    pub fn by_active_status(self, active: bool) -> Self {
        self.filter([("active", active)])
    }

    #[must_use]
    pub fn by_user(self, user_id: &str) -> Self {
        self.filter([("userId", user_id)])
    }

    #[must_use]
    pub fn by_slug(self, slug: &str) -> Self {
        self.filter([("slug", slug)])
    }

    #[must_use]
    pub fn by_created_date_range(self, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.constrain(created_between(from, to))
    }

    /// Owner id and username, plus active branches by name.
    #[must_use]
    pub fn with_relations(self) -> Self {
        let branches = IncludeSpec::all()
            .filter(Where::and([Where::eq("active", true), not_deleted()]))
            .order_by(OrderBy::by("name", SortOrder::Asc));
        self.include(IncludeMap::from([
            ("user".to_string(), IncludeSpec::all().select(["id", "username"])),
            ("branches".to_string(), branches),
        ]))
    }
}
