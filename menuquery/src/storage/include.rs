//! Projection resolution on top of [`Storage::find_many`].
//!
//! Includes are loaded per relation with one batched `IN` query per nesting level,
//! then grouped back onto their parent rows. Soft-deleted rows of a soft-deleting
//! target are never included.

use sea_orm::DbErr;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use super::{DELETED_AT, FindMany, IncludeMap, IncludeSpec, Projection, RelationKind, Row, Storage, join_key};
use crate::filtering::{FieldCondition, Where};

type IncludeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DbErr>> + Send + 'a>>;

/// Run a list query and resolve its projection.
///
/// # Errors
///
/// Propagates every storage error, including unknown relations in `projection`.
pub async fn find(
    storage: &dyn Storage,
    collection: &str,
    mut args: FindMany,
    projection: &Projection,
) -> Result<Vec<Row>, DbErr> {
    match projection {
        Projection::All => storage.find_many(collection, &args).await,
        Projection::Select(columns) => {
            args.columns = Some(columns.clone());
            storage.find_many(collection, &args).await
        }
        Projection::Include(includes) => {
            args.columns = None;
            let mut rows = storage.find_many(collection, &args).await?;
            load_includes(storage, collection, &mut rows, includes).await?;
            Ok(rows)
        }
    }
}

fn load_includes<'a>(
    storage: &'a dyn Storage,
    collection: &'a str,
    rows: &'a mut [Row],
    includes: &'a IncludeMap,
) -> IncludeFuture<'a> {
    Box::pin(async move {
        for (name, spec) in includes {
            let relation = storage.relations().require(collection, name)?.clone();

            let mut seen = HashSet::new();
            let keys: Vec<Value> = rows
                .iter()
                .filter_map(|row| row.get(&relation.local_key))
                .filter(|value| join_key(Some(*value)).is_some_and(|key| seen.insert(key)))
                .cloned()
                .collect();

            let mut related = if keys.is_empty() {
                Vec::new()
            } else {
                let keyed = Where::field(relation.remote_key.clone(), FieldCondition::In(keys));
                let live = if storage.relations().is_soft_deleting(&relation.target) {
                    Where::is_null(DELETED_AT)
                } else {
                    Where::default()
                };
                let filter = Where::and([keyed, live, spec.filter.clone().unwrap_or_default()]);
                let args = FindMany {
                    filter,
                    order_by: spec.order_by.clone(),
                    ..FindMany::default()
                };
                storage.find_many(&relation.target, &args).await?
            };
            load_includes(storage, &relation.target, &mut related, &spec.include).await?;

            let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
            for row in related {
                if let Some(key) = join_key(row.get(&relation.remote_key)) {
                    groups
                        .entry(key)
                        .or_default()
                        .push(Value::Object(project(row, spec)));
                }
            }

            for row in rows.iter_mut() {
                let matched = join_key(row.get(&relation.local_key))
                    .and_then(|key| groups.get(&key))
                    .cloned()
                    .unwrap_or_default();
                let value = match relation.kind {
                    RelationKind::One => matched.into_iter().next().unwrap_or(Value::Null),
                    RelationKind::Many => Value::Array(matched),
                };
                row.insert(name.clone(), value);
            }
        }
        Ok(())
    })
}

/// Keep selected columns plus the nested includes themselves.
fn project(mut row: Row, spec: &IncludeSpec) -> Row {
    if let Some(columns) = &spec.select {
        row.retain(|key, _| columns.iter().any(|c| c == key) || spec.include.contains_key(key));
    }
    row
}
