use serde_json::Value;

use super::pinned;
use crate::filtering::{FilterSpec, Operation};
use crate::storage::{IncludeMap, IncludeSpec};

entity_query!(
    /// Menu items, excluding soft-deleted ones.
    MenuItemQuery,
    collection = "menuItems",
    soft_delete = true,
    model = crate::catalog::menu_item
);

impl MenuItemQuery<'_> {
    #[must_use]
    pub fn by_category(self, category_id: &str) -> Self {
        self.filter([("categoryId", category_id)])
    }

    #[must_use]
    pub fn by_store(self, store_id: &str) -> Self {
        self.filter([("storeId", store_id)])
    }

    #[must_use]
    pub fn by_availability(self, available: bool) -> Self {
        self.filter([("available", available)])
    }

    /// Inclusive price range
    #[must_use]
    pub fn by_price_range(self, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.constrain(FilterSpec::between_static("price", min, max))
    }

    #[must_use]
    pub fn by_tag(self, tag: &str) -> Self {
        self.constrain(pinned("tags", Operation::Has(Value::from(tag))))
    }

    #[must_use]
    pub fn with_relations(self) -> Self {
        self.include(IncludeMap::from([(
            "category".to_string(),
            IncludeSpec::all().select(["id", "title"]),
        )]))
    }
}
