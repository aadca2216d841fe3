//! Sea-ORM backed store.
//!
//! Each nesting level of a [`Where`] tree gets its own table alias (`t0` for the
//! queried collection, `t1`, `t2`, ... for relation subqueries). Relation conditions
//! compile to correlated `EXISTS` subqueries, so one list call is always one SQL
//! statement. Values are bound parameters and identifiers are quoted by `sea_query`.
//!
//! Rows are addressed by an `id` primary key column for writes.

use async_trait::async_trait;
use sea_orm::sea_query::{
    Alias, Asterisk, BinOper, Condition, Expr, ExprTrait, Func, LikeExpr, NullOrdering, Order,
    Query, SelectStatement, SimpleExpr,
};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, FromQueryResult, JsonValue,
};
use serde_json::Value;
use uuid::Uuid;

use super::{FindMany, Relations, Row, Storage};
use crate::config::QueryConfig;
use crate::filtering::{FieldCondition, MatchMode, OrderBy, Quantifier, SortOrder, TextOp, Where};

const ROOT_ALIAS: &str = "t0";
/// LIMIT used when only an offset is requested
const UNBOUNDED: u64 = 9_223_372_036_854_775_807;

pub struct SeaStore {
    db: DatabaseConnection,
    relations: Relations,
    fulltext_language: String,
}

impl SeaStore {
    #[must_use]
    pub fn new(db: DatabaseConnection, relations: Relations) -> Self {
        Self {
            db,
            relations,
            fulltext_language: "english".to_string(),
        }
    }

    /// Text search configuration used by Postgres `to_tsvector`
    #[must_use]
    pub fn with_fulltext_language(mut self, language: impl Into<String>) -> Self {
        self.fulltext_language = language.into();
        self
    }

    /// Take engine-wide settings, currently the full-text search language.
    #[must_use]
    pub fn with_config(self, config: &QueryConfig) -> Self {
        self.with_fulltext_language(config.fulltext_language.clone())
    }

    #[must_use]
    pub fn fulltext_language(&self) -> &str {
        &self.fulltext_language
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn compiler(&self) -> SqlCompiler<'_> {
        SqlCompiler {
            backend: self.db.get_database_backend(),
            relations: &self.relations,
            language: &self.fulltext_language,
            aliases: 0,
        }
    }

    async fn matching_ids(&self, collection: &str, filter: &Where) -> Result<Vec<Value>, DbErr> {
        let args = FindMany {
            filter: filter.clone(),
            columns: Some(vec!["id".to_string()]),
            ..FindMany::default()
        };
        let rows = self.find_many(collection, &args).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove("id"))
            .collect())
    }
}

#[async_trait]
impl Storage for SeaStore {
    fn relations(&self) -> &Relations {
        &self.relations
    }

    async fn find_many(&self, collection: &str, args: &FindMany) -> Result<Vec<Row>, DbErr> {
        let select = self.compiler().select(collection, args)?;
        let statement = self.db.get_database_backend().build(&select);
        tracing::debug!(collection, sql = %statement, "find_many");

        let rows = JsonValue::find_by_statement(statement).all(&self.db).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Where) -> Result<u64, DbErr> {
        let select = self.compiler().count(collection, filter)?;
        let statement = self.db.get_database_backend().build(&select);
        tracing::debug!(collection, sql = %statement, "count");

        let Some(row) = self.db.query_one(statement).await? else {
            return Ok(0);
        };
        let count: i64 = row.try_get("", "count")?;
        u64::try_from(count).map_err(|e| DbErr::Custom(format!("invalid row count: {e}")))
    }

    async fn insert(&self, collection: &str, mut row: Row) -> Result<Row, DbErr> {
        if row.get("id").is_none_or(Value::is_null) {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        let id = row.get("id").cloned().unwrap_or(Value::Null);

        let (columns, values): (Vec<_>, Vec<_>) = row
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (Alias::new(key), SimpleExpr::Value(to_sea_value(value))))
            .unzip();

        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(collection))
            .columns(columns)
            .values(values)
            .map_err(|e| DbErr::Custom(e.to_string()))?;
        self.db
            .execute(self.db.get_database_backend().build(&insert))
            .await?;

        let args = FindMany {
            filter: Where::eq("id", id),
            take: Some(1),
            ..FindMany::default()
        };
        self.find_many(collection, &args)
            .await?
            .pop()
            .ok_or_else(|| DbErr::RecordNotFound(format!("{collection} after insert")))
    }

    async fn update_many(&self, collection: &str, filter: &Where, patch: Row) -> Result<u64, DbErr> {
        let ids = self.matching_ids(collection, filter).await?;
        if ids.is_empty() || patch.is_empty() {
            return Ok(ids.len() as u64);
        }

        let mut update = Query::update();
        update
            .table(Alias::new(collection))
            .values(
                patch
                    .iter()
                    .map(|(key, value)| (Alias::new(key), SimpleExpr::Value(to_sea_value(value)))),
            )
            .cond_where(Expr::col(Alias::new("id")).is_in(ids.iter().map(to_sea_value)));
        let result = self
            .db
            .execute(self.db.get_database_backend().build(&update))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, collection: &str, filter: &Where) -> Result<u64, DbErr> {
        let ids = self.matching_ids(collection, filter).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let mut delete = Query::delete();
        delete
            .from_table(Alias::new(collection))
            .cond_where(Expr::col(Alias::new("id")).is_in(ids.iter().map(to_sea_value)));
        let result = self
            .db
            .execute(self.db.get_database_backend().build(&delete))
            .await?;
        Ok(result.rows_affected())
    }
}

/// Compiles [`Where`] trees for one statement; owns the alias counter.
struct SqlCompiler<'a> {
    backend: DatabaseBackend,
    relations: &'a Relations,
    language: &'a str,
    aliases: usize,
}

impl SqlCompiler<'_> {
    fn select(&mut self, collection: &str, args: &FindMany) -> Result<SelectStatement, DbErr> {
        let mut select = Query::select();
        select.from_as(Alias::new(collection), Alias::new(ROOT_ALIAS));
        match &args.columns {
            Some(columns) => {
                for column in columns {
                    select.column((Alias::new(ROOT_ALIAS), Alias::new(column)));
                }
            }
            None => {
                select.column((Alias::new(ROOT_ALIAS), Asterisk));
            }
        }
        if !args.filter.is_match_all() {
            select.cond_where(self.condition(collection, ROOT_ALIAS, &args.filter)?);
        }
        apply_order(&mut select, &args.order_by);
        if let Some(take) = args.take {
            select.limit(take);
        }
        if args.skip > 0 {
            if args.take.is_none() {
                select.limit(UNBOUNDED);
            }
            select.offset(args.skip);
        }
        Ok(select)
    }

    fn count(&mut self, collection: &str, filter: &Where) -> Result<SelectStatement, DbErr> {
        let mut select = Query::select();
        select
            .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
            .from_as(Alias::new(collection), Alias::new(ROOT_ALIAS));
        if !filter.is_match_all() {
            select.cond_where(self.condition(collection, ROOT_ALIAS, filter)?);
        }
        Ok(select)
    }

    fn condition(&mut self, collection: &str, alias: &str, filter: &Where) -> Result<Condition, DbErr> {
        Ok(match filter {
            Where::All(members) if members.is_empty() => constant(true),
            Where::Any(members) if members.is_empty() => constant(false),
            Where::All(members) => {
                let mut all = Condition::all();
                for member in members {
                    all = all.add(self.condition(collection, alias, member)?);
                }
                all
            }
            Where::Any(members) => {
                let mut any = Condition::any();
                for member in members {
                    any = any.add(self.condition(collection, alias, member)?);
                }
                any
            }
            Where::Not(inner) => self.condition(collection, alias, inner)?.not(),
            Where::Field { field, condition } => {
                Condition::all().add(self.field(alias, field, condition))
            }
            Where::Relation {
                relation,
                quantifier,
                condition,
            } => {
                let def = self.relations.require(collection, relation)?.clone();
                self.aliases += 1;
                let sub_alias = format!("t{}", self.aliases);
                let inner = self.condition(&def.target, &sub_alias, condition)?;

                let join = Expr::col((Alias::new(&sub_alias), Alias::new(&def.remote_key)))
                    .equals((Alias::new(alias), Alias::new(&def.local_key)));
                let inner = match quantifier {
                    Quantifier::Every => inner.not(),
                    _ => inner,
                };
                let mut sub = Query::select();
                sub.expr(Expr::val(1))
                    .from_as(Alias::new(&def.target), Alias::new(&sub_alias))
                    .cond_where(Condition::all().add(join).add(inner));

                let exists = Condition::all().add(Expr::exists(sub));
                match quantifier {
                    Quantifier::Is | Quantifier::Some => exists,
                    Quantifier::Every | Quantifier::None => exists.not(),
                }
            }
        })
    }

    fn field(&self, alias: &str, field: &str, condition: &FieldCondition) -> SimpleExpr {
        let column = || Expr::col((Alias::new(alias), Alias::new(field)));
        match condition {
            FieldCondition::Equals(Value::Null) | FieldCondition::IsNull => column().is_null(),
            FieldCondition::NotEquals(Value::Null) | FieldCondition::IsNotNull => {
                column().is_not_null()
            }
            FieldCondition::Equals(value) => column().eq(to_sea_value(value)),
            FieldCondition::NotEquals(value) => column().ne(to_sea_value(value)),
            FieldCondition::Gt(value) => column().gt(to_sea_value(value)),
            FieldCondition::Gte(value) => column().gte(to_sea_value(value)),
            FieldCondition::Lt(value) => column().lt(to_sea_value(value)),
            FieldCondition::Lte(value) => column().lte(to_sea_value(value)),
            FieldCondition::Between(lo, hi) => column().between(to_sea_value(lo), to_sea_value(hi)),
            FieldCondition::In(values) if values.is_empty() => Expr::cust("1 = 0"),
            FieldCondition::In(values) => column().is_in(values.iter().map(to_sea_value)),
            FieldCondition::NotIn(values) if values.is_empty() => column().is_not_null(),
            FieldCondition::NotIn(values) => column().is_not_in(values.iter().map(to_sea_value)),
            FieldCondition::Text {
                op,
                value,
                mode,
                negated,
            } => {
                let matched = self.text(column, *op, value, *mode);
                if *negated {
                    column().is_not_null().and(matched.not())
                } else {
                    matched
                }
            }
            FieldCondition::Regex { pattern, mode } => self.regex(column().into(), pattern, *mode),
            FieldCondition::Search { terms, mode } => self.search(column, terms, *mode),
            FieldCondition::Has(item) => self.has(column().into(), item),
            FieldCondition::HasNot(item) => {
                column().is_not_null().and(self.has(column().into(), item).not())
            }
        }
    }

    fn text(&self, column: impl Fn() -> Expr, op: TextOp, needle: &str, mode: MatchMode) -> SimpleExpr {
        if needle.is_empty() {
            return column().is_not_null();
        }
        let escaped = escape_like_wildcards(needle);
        let pattern = match op {
            TextOp::Contains => format!("%{escaped}%"),
            TextOp::StartsWith => format!("{escaped}%"),
            TextOp::EndsWith => format!("%{escaped}"),
        };

        // SQLite's UPPER folds ASCII only: non-ASCII letters stay case-sensitive there,
        // unlike on Postgres or in MemoryStore.
        if mode.is_insensitive() {
            return Expr::expr(Func::upper(column()))
                .like(LikeExpr::new(pattern.to_uppercase()).escape('\\'));
        }
        match self.backend {
            DatabaseBackend::Postgres => column().like(LikeExpr::new(pattern).escape('\\')),
            DatabaseBackend::MySql => Expr::cust_with_exprs(
                "BINARY ? LIKE ?",
                [column().into(), Expr::val(pattern).into()],
            ),
            // SQLite LIKE ignores ASCII case, so compare bytes directly
            DatabaseBackend::Sqlite => {
                let sql = match op {
                    TextOp::Contains => "instr(?, ?) > 0",
                    TextOp::StartsWith => "substr(?, 1, length(?)) = ?",
                    TextOp::EndsWith => "substr(?, -length(?)) = ?",
                };
                let mut exprs: Vec<SimpleExpr> = vec![column().into(), Expr::val(needle).into()];
                if op != TextOp::Contains {
                    exprs.push(Expr::val(needle).into());
                }
                Expr::cust_with_exprs(sql, exprs)
            }
        }
    }

    fn regex(&self, column: SimpleExpr, pattern: &str, mode: MatchMode) -> SimpleExpr {
        match self.backend {
            DatabaseBackend::Postgres => {
                let op = if mode.is_insensitive() { "~*" } else { "~" };
                Expr::expr(column).binary(BinOper::Custom(op), Expr::val(pattern))
            }
            DatabaseBackend::MySql => {
                let sql = if mode.is_insensitive() {
                    "REGEXP_LIKE(?, ?, 'i')"
                } else {
                    "REGEXP_LIKE(?, ?, 'c')"
                };
                Expr::cust_with_exprs(sql, [column, Expr::val(pattern).into()])
            }
            // Requires a REGEXP function registered on the connection
            DatabaseBackend::Sqlite => {
                let pattern = if mode.is_insensitive() {
                    format!("(?i){pattern}")
                } else {
                    pattern.to_string()
                };
                Expr::cust_with_exprs("? REGEXP ?", [column, Expr::val(pattern).into()])
            }
        }
    }

    fn search(&self, column: impl Fn() -> Expr, terms: &str, mode: MatchMode) -> SimpleExpr {
        if self.backend == DatabaseBackend::Postgres {
            return Expr::cust_with_exprs(
                "to_tsvector($1::regconfig, $2) @@ plainto_tsquery($1::regconfig, $3)",
                [
                    Expr::val(self.language).into(),
                    column().into(),
                    Expr::val(terms).into(),
                ],
            );
        }
        terms
            .split_whitespace()
            .map(|term| self.text(&column, TextOp::Contains, term, mode))
            .reduce(SimpleExpr::and)
            .unwrap_or_else(|| column().is_not_null())
    }

    fn has(&self, column: SimpleExpr, item: &Value) -> SimpleExpr {
        match self.backend {
            DatabaseBackend::Postgres => {
                Expr::cust_with_exprs("$1 = ANY($2)", [Expr::val(to_sea_value(item)).into(), column])
            }
            DatabaseBackend::MySql => Expr::cust_with_exprs(
                "JSON_CONTAINS(?, ?)",
                [column, Expr::val(item.to_string()).into()],
            ),
            DatabaseBackend::Sqlite => Expr::cust_with_exprs(
                "EXISTS (SELECT 1 FROM json_each(?) WHERE json_each.value = ?)",
                [column, Expr::val(to_sea_value(item)).into()],
            ),
        }
    }
}

fn constant(value: bool) -> Condition {
    Condition::all().add(Expr::cust(if value { "1 = 1" } else { "1 = 0" }))
}

/// Nulls sort first in ascending order on every backend
fn apply_order(select: &mut SelectStatement, order_by: &OrderBy) {
    for (field, order) in order_by.iter() {
        let (order, nulls) = match order {
            SortOrder::Asc => (Order::Asc, NullOrdering::First),
            SortOrder::Desc => (Order::Desc, NullOrdering::Last),
        };
        select.order_by_with_nulls((Alias::new(ROOT_ALIAS), Alias::new(field)), order, nulls);
    }
}

/// Escape LIKE wildcards; backslash is the escape character
fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn to_sea_value(value: &Value) -> sea_orm::Value {
    match value {
        Value::Null => sea_orm::Value::String(None),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else if let Some(u) = n.as_u64() {
                u.into()
            } else {
                n.as_f64().unwrap_or_default().into()
            }
        }
        Value::String(s) => s.clone().into(),
        Value::Array(_) | Value::Object(_) => value.clone().into(),
    }
}
