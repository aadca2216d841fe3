//! # Relational Storage Collaborator
//!
//! The engine never talks to a database directly. It compiles intent into calls on a
//! [`Storage`] handle that is passed explicitly into every query builder and service.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: tables of JSON rows evaluated in-process, used as a fake in
//!   tests and for prototyping.
//! - [`SeaStore`]: a Sea-ORM connection; conditions are compiled to `sea_query`
//!   with bound parameters, relation conditions to correlated `EXISTS` subqueries.
//!
//! Every failure is a [`DbErr`] and is propagated unchanged.

use async_trait::async_trait;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::filtering::{OrderBy, Where};

mod include;
pub mod memory;
pub mod sea;

pub use include::find;
pub use memory::MemoryStore;
pub use sea::SeaStore;

/// One stored record.
pub type Row = Map<String, Value>;

/// Arguments of a list query against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindMany {
    pub filter: Where,
    pub order_by: OrderBy,
    pub take: Option<u64>,
    pub skip: u64,
    /// Column projection; `None` returns every column
    pub columns: Option<Vec<String>>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Relation metadata used to resolve nested conditions and includes
    fn relations(&self) -> &Relations;

    async fn find_many(&self, collection: &str, args: &FindMany) -> Result<Vec<Row>, DbErr>;

    async fn count(&self, collection: &str, filter: &Where) -> Result<u64, DbErr>;

    /// Insert one row; a missing `id` is generated
    async fn insert(&self, collection: &str, row: Row) -> Result<Row, DbErr>;

    async fn update_many(&self, collection: &str, filter: &Where, patch: Row) -> Result<u64, DbErr>;

    async fn delete_many(&self, collection: &str, filter: &Where) -> Result<u64, DbErr>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// `local_key` on this row references `remote_key` on at most one target row
    One,
    /// Any number of target rows reference this row
    Many,
}

/// How a named relation of a collection joins to its target collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    pub local_key: String,
    pub remote_key: String,
    pub kind: RelationKind,
}

impl RelationDef {
    /// `collection.local_key -> target.id`
    #[must_use]
    pub fn belongs_to(name: &str, target: &str, local_key: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            local_key: local_key.to_string(),
            remote_key: "id".to_string(),
            kind: RelationKind::One,
        }
    }

    /// `collection.id <- target.remote_key`
    #[must_use]
    pub fn has_many(name: &str, target: &str, remote_key: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            local_key: "id".to_string(),
            remote_key: remote_key.to_string(),
            kind: RelationKind::Many,
        }
    }
}

/// Column marking a row of a soft-deleting collection as deleted.
pub const DELETED_AT: &str = "deletedAt";

/// Relation registry keyed by collection, then relation name.
#[derive(Debug, Clone, Default)]
pub struct Relations {
    defs: HashMap<String, HashMap<String, RelationDef>>,
    /// Collections whose rows carry `deletedAt`; includes of them skip deleted rows
    soft_deleting: HashSet<String>,
}

impl Relations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collection: &str, def: RelationDef) {
        self.defs
            .entry(collection.to_string())
            .or_default()
            .insert(def.name.clone(), def);
    }

    #[must_use]
    pub fn with(mut self, collection: &str, def: RelationDef) -> Self {
        self.add(collection, def);
        self
    }

    #[must_use]
    pub fn get(&self, collection: &str, name: &str) -> Option<&RelationDef> {
        self.defs.get(collection)?.get(name)
    }

    /// # Errors
    ///
    /// Returns `DbErr::Custom` naming the unknown relation.
    pub fn require(&self, collection: &str, name: &str) -> Result<&RelationDef, DbErr> {
        self.get(collection, name)
            .ok_or_else(|| DbErr::Custom(format!("unknown relation {collection}.{name}")))
    }

    pub fn mark_soft_delete(&mut self, collection: &str) {
        self.soft_deleting.insert(collection.to_string());
    }

    #[must_use]
    pub fn with_soft_delete(mut self, collection: &str) -> Self {
        self.mark_soft_delete(collection);
        self
    }

    #[must_use]
    pub fn is_soft_deleting(&self, collection: &str) -> bool {
        self.soft_deleting.contains(collection)
    }

    pub fn merge(&mut self, other: Self) {
        for (collection, defs) in other.defs {
            self.defs.entry(collection).or_default().extend(defs);
        }
        self.soft_deleting.extend(other.soft_deleting);
    }
}

/// Relations to load alongside each row, keyed by relation name.
pub type IncludeMap = BTreeMap<String, IncludeSpec>;

/// Options for one included relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeSpec {
    pub filter: Option<Where>,
    pub select: Option<Vec<String>>,
    pub order_by: OrderBy,
    pub include: IncludeMap,
}

impl IncludeSpec {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    #[must_use]
    pub fn include(mut self, relation: &str, spec: Self) -> Self {
        self.include.insert(relation.to_string(), spec);
        self
    }
}

/// Mutually exclusive relation inclusion or column projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    #[default]
    All,
    Include(IncludeMap),
    Select(Vec<String>),
}

/// Canonical join key of a column value; null never joins.
pub(crate) fn join_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relations_registry() {
        let relations = Relations::new()
            .with("stores", RelationDef::belongs_to("user", "users", "userId"))
            .with("stores", RelationDef::has_many("branches", "branches", "storeId"));

        let user = relations.get("stores", "user").unwrap();
        assert_eq!(user.local_key, "userId");
        assert_eq!(user.remote_key, "id");
        assert_eq!(relations.get("stores", "branches").unwrap().kind, RelationKind::Many);
        assert!(relations.require("stores", "menus").is_err());
        assert!(!relations.is_soft_deleting("users"));

        let mut merged = Relations::new();
        merged.merge(relations.with_soft_delete("users"));
        assert!(merged.is_soft_deleting("users"));
        assert!(merged.get("stores", "user").is_some());
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key(Some(&json!("a"))), Some("a".to_string()));
        assert_eq!(join_key(Some(&json!(7))), Some("7".to_string()));
        assert_eq!(join_key(Some(&Value::Null)), None);
        assert_eq!(join_key(None), None);
    }
}
