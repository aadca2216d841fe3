//! # Query Builders
//!
//! [`QueryBuilder`] is the generic accumulator; [`entities`] holds thin per-collection
//! specializations that pre-bind the collection, bake in soft-delete exclusion where the
//! collection has it, and add named convenience filters.

pub mod builder;
pub mod entities;

pub use builder::{QueryBuilder, SearchMode};
pub use entities::{CategoryQuery, FileQuery, MenuItemQuery, StoreQuery, UserQuery};
