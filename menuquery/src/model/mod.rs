//! # Model-Driven CRUD
//!
//! A [`ModelDescription`] is interpreted directly: [`generate`] derives validation
//! schemas, a [`QuerySpec`], OpenAPI [`ModelTypes`] and a generic [`ModelService`],
//! and mounts them behind an axum router. No code is emitted.

pub mod description;
pub mod generator;
pub mod router;
pub mod schema;
pub mod service;

pub use description::{
    CrudOperation, FieldBounds, FieldDescription, FieldType, ModelDescription, Permissions, RelationBinding,
    relations_for,
};
pub use generator::{GeneratedModel, ModelTypes, generate, generate_all};
pub use schema::{CreateSchema, IdSchema, ListSchema, ModelSchemas, UpdateInput, UpdateSchema};
pub use service::{ModelService, QuerySpec};
