//! # menuquery
//!
//! Declarative filtering, paginated queries and model-driven CRUD for the menu admin
//! backend.
//!
//! - [`filtering`]: the advanced-search DSL ([`FilterSpec`]), its operator compiler and
//!   the [`Where`] condition tree every store consumes
//! - [`query`]: the generic [`QueryBuilder`] and per-entity builders
//! - [`storage`]: the [`Storage`] collaborator, with in-memory and Sea-ORM backends
//! - [`model`]: [`ModelDescription`] interpreted into schemas, handlers and routes
//! - [`list_endpoint`]: the access-checked list adapter
//!
//! ```rust,ignore
//! let storage = SeaStore::new(db, catalog::relations());
//! let page = StoreQuery::new(&storage)
//!     .by_active_status(true)
//!     .search_text("cafe", ["title"])
//!     .paginate(Some(10), Some(0))
//!     .execute_rows()
//!     .await?;
//! ```

pub mod access;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod filtering;
pub mod list_endpoint;
pub mod model;
pub mod query;
pub mod storage;
pub mod validation;

pub use access::{AccessControl, Caller, RoleAccess};
pub use config::QueryConfig;
pub use errors::ApiError;
pub use filtering::{FilterSpec, Operation, OrderBy, Paginated, SortOrder, Where};
pub use list_endpoint::{ListEndpoint, ListParams, ListRequest};
pub use model::{GeneratedModel, ModelDescription, generate, generate_all};
pub use query::QueryBuilder;
pub use storage::{MemoryStore, SeaStore, Storage};
pub use validation::{ValidationError, ValidationErrors};

pub use serde_with;
