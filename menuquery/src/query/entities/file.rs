use serde_json::Value;

use super::{created_between, pinned};
use crate::filtering::Operation;
use crate::storage::{IncludeMap, IncludeSpec};

entity_query!(
    /// Uploaded files. Deleting a file removes the row, so there is no base filter.
    FileQuery,
    collection = "files",
    soft_delete = false,
    model = crate::catalog::file
);

impl FileQuery<'_> {
    #[must_use]
    pub fn by_user(self, user_id: &str) -> Self {
        self.filter([("userId", user_id)])
    }

    #[must_use]
    pub fn by_store(self, store_id: &str) -> Self {
        self.filter([("storeId", store_id)])
    }

    /// MIME type prefix, e.g. `image/`
    #[must_use]
    pub fn by_mime_type(self, prefix: &str) -> Self {
        self.constrain(pinned("mimeType", Operation::StartsWith(prefix.to_string())))
    }

    #[must_use]
    pub fn by_created_date_range(self, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.constrain(created_between(from, to))
    }

    #[must_use]
    pub fn with_relations(self) -> Self {
        self.include(IncludeMap::from([(
            "user".to_string(),
            IncludeSpec::all().select(["id", "username"]),
        )]))
    }
}
