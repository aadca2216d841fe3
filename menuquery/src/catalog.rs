//! Model descriptions of the restaurant-menu domain.
//!
//! Collections and relation names here are the ones the entity query builders in
//! [`crate::query`] assume.

use crate::filtering::{OrderBy, SortOrder};
use crate::model::{FieldDescription, FieldType, ModelDescription, Permissions, RelationBinding, relations_for};
use crate::storage::Relations;

const OWNERS: [&str; 2] = ["admin", "owner"];

#[must_use]
pub fn store() -> ModelDescription {
    ModelDescription::new("store")
        .describe("A restaurant with its own public menu")
        .soft_delete()
        .field(
            FieldDescription::new("title", FieldType::String)
                .required()
                .searchable()
                .sortable()
                .length(Some(2), Some(100)),
        )
        .field(
            FieldDescription::new("slug", FieldType::String)
                .required()
                .searchable()
                .filterable()
                .sortable()
                .length(Some(2), Some(64))
                .pattern("^[a-z0-9]+(-[a-z0-9]+)*$"),
        )
        .field(FieldDescription::new("description", FieldType::Text).searchable().length(None, Some(2000)))
        .field(FieldDescription::new("active", FieldType::Boolean).filterable().default_value(true))
        .field(FieldDescription::new("userId", FieldType::Uuid).required().filterable())
        .field(FieldDescription::relation("user", RelationBinding::belongs_to("users", "userId")))
        .field(FieldDescription::relation("branches", RelationBinding::has_many("branches", "storeId")))
        .field(FieldDescription::relation("categories", RelationBinding::has_many("categories", "storeId")))
        .field(FieldDescription::relation("items", RelationBinding::has_many("menuItems", "storeId")))
        .include_by_default("user")
        .permissions(Permissions::default().writes(OWNERS))
}

#[must_use]
pub fn branch() -> ModelDescription {
    ModelDescription::new("branch")
        .plural("branches")
        .soft_delete()
        .field(FieldDescription::new("name", FieldType::String).required().searchable().sortable())
        .field(FieldDescription::new("address", FieldType::Text).searchable())
        .field(FieldDescription::new("phone", FieldType::String).length(None, Some(32)))
        .field(FieldDescription::new("active", FieldType::Boolean).filterable().default_value(true))
        .field(FieldDescription::new("storeId", FieldType::Uuid).required().filterable())
        .field(FieldDescription::relation("store", RelationBinding::belongs_to("stores", "storeId")))
        .order(OrderBy::by("name", SortOrder::Asc))
        .permissions(Permissions::default().writes(OWNERS))
}

#[must_use]
pub fn user() -> ModelDescription {
    let roles = ["admin", "owner", "staff"].map(String::from).to_vec();
    ModelDescription::new("user")
        .soft_delete()
        .field(
            FieldDescription::new("username", FieldType::String)
                .required()
                .searchable()
                .sortable()
                .length(Some(3), Some(32))
                .pattern("^[A-Za-z0-9_.-]+$"),
        )
        .field(FieldDescription::new("email", FieldType::Email).required().searchable().filterable())
        .field(
            FieldDescription::new("role", FieldType::Enum(roles))
                .filterable()
                .default_value("staff"),
        )
        .field(FieldDescription::new("active", FieldType::Boolean).filterable().default_value(true))
        .field(FieldDescription::relation("stores", RelationBinding::has_many("stores", "userId")))
        .field(FieldDescription::relation("files", RelationBinding::has_many("files", "userId")))
        .permissions(Permissions {
            list: vec!["admin".into()],
            ..Permissions::default().writes(["admin"])
        })
}

#[must_use]
pub fn file() -> ModelDescription {
    ModelDescription::new("file")
        .field(FieldDescription::new("name", FieldType::String).required().searchable().sortable())
        .field(FieldDescription::new("path", FieldType::String).required())
        .field(FieldDescription::new("mimeType", FieldType::String).required().filterable())
        .field(FieldDescription::new("size", FieldType::Int).filterable().sortable().range(Some(0.0), None))
        .field(FieldDescription::new("userId", FieldType::Uuid).required().filterable())
        .field(FieldDescription::new("storeId", FieldType::Uuid).filterable())
        .field(FieldDescription::relation("user", RelationBinding::belongs_to("users", "userId")))
        .field(FieldDescription::relation("store", RelationBinding::belongs_to("stores", "storeId")))
        .permissions(Permissions::default().writes(OWNERS))
}

#[must_use]
pub fn category() -> ModelDescription {
    ModelDescription::new("category")
        .plural("categories")
        .soft_delete()
        .field(FieldDescription::new("title", FieldType::String).required().searchable().sortable().length(Some(1), Some(80)))
        .field(FieldDescription::new("position", FieldType::Int).sortable().range(Some(0.0), None).default_value(0))
        .field(FieldDescription::new("active", FieldType::Boolean).filterable().default_value(true))
        .field(FieldDescription::new("storeId", FieldType::Uuid).required().filterable())
        .field(FieldDescription::relation("store", RelationBinding::belongs_to("stores", "storeId")))
        .field(FieldDescription::relation("items", RelationBinding::has_many("menuItems", "categoryId")))
        .order(OrderBy::by("position", SortOrder::Asc))
        .permissions(Permissions::default().writes(OWNERS))
}

#[must_use]
pub fn menu_item() -> ModelDescription {
    ModelDescription::new("menuItem")
        .soft_delete()
        .field(FieldDescription::new("title", FieldType::String).required().searchable().sortable().length(Some(1), Some(120)))
        .field(FieldDescription::new("description", FieldType::Text).searchable().length(None, Some(1000)))
        .field(
            FieldDescription::new("price", FieldType::Float)
                .required()
                .filterable()
                .sortable()
                .range(Some(0.0), None),
        )
        .field(FieldDescription::new("available", FieldType::Boolean).filterable().default_value(true))
        .field(FieldDescription::new("tags", FieldType::Json).default_value(serde_json::json!([])))
        .field(FieldDescription::new("position", FieldType::Int).sortable().default_value(0))
        .field(FieldDescription::new("categoryId", FieldType::Uuid).required().filterable())
        .field(FieldDescription::new("storeId", FieldType::Uuid).required().filterable())
        .field(FieldDescription::relation("category", RelationBinding::belongs_to("categories", "categoryId")))
        .field(FieldDescription::relation("store", RelationBinding::belongs_to("stores", "storeId")))
        .permissions(Permissions::default().writes(OWNERS))
}

/// Every model of the domain.
#[must_use]
pub fn all() -> Vec<ModelDescription> {
    vec![store(), branch(), user(), file(), category(), menu_item()]
}

/// Relation registry for [`all`], to hand to a storage implementation.
#[must_use]
pub fn relations() -> Relations {
    relations_for(&all())
}
