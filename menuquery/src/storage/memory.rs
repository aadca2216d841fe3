//! In-memory relational store.
//!
//! Evaluates [`Where`] trees directly against JSON rows with SQL-like null semantics:
//! comparisons against a missing or null column never match, except `eq null` and
//! `isNull`. Relations are resolved through the same [`Relations`] registry the SQL
//! store uses, so both stores answer the same query identically.

use async_trait::async_trait;
use sea_orm::DbErr;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FindMany, Relations, Row, Storage, join_key};
use crate::filtering::{FieldCondition, MatchMode, OrderBy, Quantifier, SortOrder, Where};

type Tables = HashMap<String, Vec<Row>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    relations: Relations,
}

impl MemoryStore {
    #[must_use]
    pub fn new(relations: Relations) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            relations,
        }
    }

    /// Append rows to a collection without id generation or validation.
    pub async fn seed(&self, collection: &str, rows: impl IntoIterator<Item = Row>) {
        self.tables
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    /// Copy of every row currently stored in `collection`, including soft-deleted ones.
    pub async fn rows(&self, collection: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn matching_indices(&self, tables: &Tables, collection: &str, filter: &Where) -> Result<Vec<usize>, DbErr> {
        let eval = Evaluator {
            tables,
            relations: &self.relations,
            regexes: RegexCache::default(),
        };
        let mut indices = Vec::new();
        for (index, row) in tables.get(collection).into_iter().flatten().enumerate() {
            if eval.matches(collection, row, filter)? {
                indices.push(index);
            }
        }
        Ok(indices)
    }
}

#[async_trait]
impl Storage for MemoryStore {
    fn relations(&self) -> &Relations {
        &self.relations
    }

    async fn find_many(&self, collection: &str, args: &FindMany) -> Result<Vec<Row>, DbErr> {
        let tables = self.tables.read().await;
        let indices = self.matching_indices(&tables, collection, &args.filter)?;
        let Some(table) = tables.get(collection) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Row> = indices.into_iter().map(|i| &table[i]).collect();
        sort_rows(&mut rows, &args.order_by);

        let skip = usize::try_from(args.skip).unwrap_or(usize::MAX);
        let take = args
            .take
            .map_or(usize::MAX, |t| usize::try_from(t).unwrap_or(usize::MAX));

        Ok(rows
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| match &args.columns {
                Some(columns) => columns
                    .iter()
                    .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                    .collect(),
                None => row.clone(),
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Where) -> Result<u64, DbErr> {
        let tables = self.tables.read().await;
        let indices = self.matching_indices(&tables, collection, filter)?;
        Ok(indices.len() as u64)
    }

    async fn insert(&self, collection: &str, mut row: Row) -> Result<Row, DbErr> {
        if row.get("id").is_none_or(Value::is_null) {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        let mut tables = self.tables.write().await;
        tables
            .entry(collection.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update_many(&self, collection: &str, filter: &Where, patch: Row) -> Result<u64, DbErr> {
        let mut tables = self.tables.write().await;
        let indices = self.matching_indices(&tables, collection, filter)?;
        if let Some(table) = tables.get_mut(collection) {
            for &index in &indices {
                for (key, value) in &patch {
                    table[index].insert(key.clone(), value.clone());
                }
            }
        }
        Ok(indices.len() as u64)
    }

    async fn delete_many(&self, collection: &str, filter: &Where) -> Result<u64, DbErr> {
        let mut tables = self.tables.write().await;
        let indices = self.matching_indices(&tables, collection, filter)?;
        if let Some(table) = tables.get_mut(collection) {
            let mut index = 0;
            table.retain(|_| {
                let keep = indices.binary_search(&index).is_err();
                index += 1;
                keep
            });
        }
        Ok(indices.len() as u64)
    }
}

struct Evaluator<'a> {
    tables: &'a Tables,
    relations: &'a Relations,
    regexes: RegexCache,
}

/// Patterns compiled during one evaluation, split by case sensitivity.
#[derive(Default)]
struct RegexCache {
    compiled: RefCell<[HashMap<String, Regex>; 2]>,
}

impl RegexCache {
    fn is_match(&self, pattern: &str, insensitive: bool, haystack: &str) -> Result<bool, DbErr> {
        let mut compiled = self.compiled.borrow_mut();
        let slot = &mut compiled[usize::from(insensitive)];
        if let Some(regex) = slot.get(pattern) {
            return Ok(regex.is_match(haystack));
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(insensitive)
            .build()
            .map_err(|e| DbErr::Custom(format!("invalid regex pattern: {e}")))?;
        let hit = regex.is_match(haystack);
        slot.insert(pattern.to_string(), regex);
        Ok(hit)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.compiled.borrow().iter().map(HashMap::len).sum()
    }
}

impl Evaluator<'_> {
    fn matches(&self, collection: &str, row: &Row, filter: &Where) -> Result<bool, DbErr> {
        match filter {
            Where::All(members) => {
                for member in members {
                    if !self.matches(collection, row, member)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Where::Any(members) => {
                for member in members {
                    if self.matches(collection, row, member)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Where::Not(inner) => Ok(!self.matches(collection, row, inner)?),
            Where::Field { field, condition } => {
                field_matches(row.get(field).unwrap_or(&Value::Null), condition, &self.regexes)
            }
            Where::Relation {
                relation,
                quantifier,
                condition,
            } => {
                let def = self.relations.require(collection, relation)?;
                let Some(key) = join_key(row.get(&def.local_key)) else {
                    return Ok(matches!(quantifier, Quantifier::Every | Quantifier::None));
                };
                let related = self
                    .tables
                    .get(&def.target)
                    .into_iter()
                    .flatten()
                    .filter(|candidate| join_key(candidate.get(&def.remote_key)).as_ref() == Some(&key));

                let mut any = false;
                let mut all = true;
                for candidate in related {
                    if self.matches(&def.target, candidate, condition)? {
                        any = true;
                    } else {
                        all = false;
                    }
                }
                Ok(match quantifier {
                    Quantifier::Is | Quantifier::Some => any,
                    Quantifier::Every => all,
                    Quantifier::None => !any,
                })
            }
        }
    }
}

fn field_matches(value: &Value, condition: &FieldCondition, regexes: &RegexCache) -> Result<bool, DbErr> {
    let present = !value.is_null();
    let matched = match condition {
        FieldCondition::Equals(Value::Null) | FieldCondition::IsNull => !present,
        FieldCondition::NotEquals(Value::Null) | FieldCondition::IsNotNull => present,
        FieldCondition::Equals(expected) => values_equal(value, expected),
        FieldCondition::NotEquals(expected) => present && !values_equal(value, expected),
        FieldCondition::Gt(bound) => compare(value, bound) == Some(Ordering::Greater),
        FieldCondition::Gte(bound) => {
            matches!(compare(value, bound), Some(Ordering::Greater | Ordering::Equal))
        }
        FieldCondition::Lt(bound) => compare(value, bound) == Some(Ordering::Less),
        FieldCondition::Lte(bound) => {
            matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal))
        }
        FieldCondition::Between(lo, hi) => {
            matches!(compare(value, lo), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(value, hi), Some(Ordering::Less | Ordering::Equal))
        }
        FieldCondition::In(options) => present && options.iter().any(|o| values_equal(value, o)),
        FieldCondition::NotIn(options) => present && !options.iter().any(|o| values_equal(value, o)),
        FieldCondition::Text {
            op,
            value: needle,
            mode,
            negated,
        } => match as_text(value) {
            Some(haystack) => {
                let hit = if mode.is_insensitive() {
                    op.matches(&haystack.to_lowercase(), &needle.to_lowercase())
                } else {
                    op.matches(&haystack, needle)
                };
                hit != *negated
            }
            None => false,
        },
        FieldCondition::Regex { pattern, mode } => match as_text(value) {
            Some(haystack) => regexes.is_match(pattern, mode.is_insensitive(), &haystack)?,
            None => false,
        },
        FieldCondition::Search { terms, mode } => match as_text(value) {
            Some(haystack) => {
                let fold = |s: &str| {
                    if *mode == MatchMode::Insensitive {
                        s.to_lowercase()
                    } else {
                        s.to_string()
                    }
                };
                let haystack = fold(&haystack);
                terms.split_whitespace().all(|term| haystack.contains(&fold(term)))
            }
            None => false,
        },
        FieldCondition::Has(item) => value
            .as_array()
            .is_some_and(|items| items.iter().any(|i| values_equal(i, item))),
        FieldCondition::HasNot(item) => value
            .as_array()
            .is_some_and(|items| !items.iter().any(|i| values_equal(i, item))),
    };
    Ok(matched)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Nulls sort first in ascending order
fn sort_rows(rows: &mut [&Row], order_by: &OrderBy) {
    if order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (field, order) in order_by.iter() {
            let left = a.get(field).unwrap_or(&Value::Null);
            let right = b.get(field).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
            };
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
