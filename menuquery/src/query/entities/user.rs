use serde_json::Value;

use super::{created_between, not_deleted};
use crate::storage::{IncludeMap, IncludeSpec};

entity_query!(
    /// Users, excluding soft-deleted ones.
    UserQuery,
    collection = "users",
    soft_delete = true,
    model = crate::catalog::user
);

impl UserQuery<'_> {
    #[must_use]
    pub fn by_active_status(self, active: bool) -> Self {
        self.filter([("active", active)])
    }

    #[must_use]
    pub fn by_role(self, role: &str) -> Self {
        self.filter([("role", role)])
    }

    #[must_use]
    pub fn by_email(self, email: &str) -> Self {
        self.filter([("email", email)])
    }

    #[must_use]
    pub fn by_created_date_range(self, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.constrain(created_between(from, to))
    }

    /// The user's live stores, summary columns only.
    #[must_use]
    pub fn with_relations(self) -> Self {
        let stores = IncludeSpec::all()
            .select(["id", "title", "slug", "active"])
            .filter(not_deleted());
        self.include(IncludeMap::from([("stores".to_string(), stores)]))
    }
}
