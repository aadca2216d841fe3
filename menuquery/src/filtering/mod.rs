//! # Declarative Filtering
//!
//! Turns a serializable filter/sort/pagination request into storage conditions.
//!
//! ## Main Components
//!
//! - **[`FilterSpec`]**: one constraint of the advanced-search DSL
//! - **[`compile`]**: the operator compiler, `FilterSpec -> Where`
//! - **[`Where`]**: the storage-native condition tree every store consumes
//! - **[`OrderBy`]**: sort keys and their request forms
//! - **[`Paginated`]**: the uniform list envelope
//!
//! ## Advanced Search Example
//!
//! ```json
//! [
//!   { "field": "active", "value": true, "operation": "eq" },
//!   { "field": "price", "value": [5, 12], "operation": "between" },
//!   { "field": "title", "value": "cafe", "operation": "contains", "relation": "store" }
//! ]
//! ```
//!
//! Every entry is AND-combined. Legacy free-text search instead OR-combines a
//! case-insensitive substring match over a fixed list of fields.

pub mod compiler;
pub mod condition;
pub mod dsl;
pub mod pagination;
pub mod sort;

pub use compiler::{compile, compile_all};
pub use condition::{FieldCondition, MatchMode, Quantifier, TextOp, Where};
pub use dsl::{FilterSpec, Operation, OperatorKind, RawFilterSpec};
pub use pagination::{
    DEFAULT_LIMIT, MAX_LIMIT, PageMeta, Paginated, calculate_content_range, clamp_limit,
};
pub use sort::{DEFAULT_SORT_FIELD, OrderBy, SortOrder};
