//! ModKit Repository
//!
//! Reusable building blocks for database-backed entities: identity and audit
//! fields, soft delete, create/update/read schema contracts, declarative
//! filters and pagination, and a generic repository with blocking and
//! asynchronous variants that behave identically.
//!
//! Storage is reached only through the [`contract::Session`] and
//! [`contract::AsyncSession`] traits. Two engines ship with the crate: an
//! in-memory store and a SeaORM-backed one.

pub mod config;
pub use config::RepositoryConfig;

pub mod contract;
pub use contract::{
    AsyncSession, AuditMeta, CreateSchema, DeleteMode, FieldDef, FieldKind, FieldValue,
    IdentityMeta, Patch, ReadSchema, Record, RepoError, RepoResult, Schema, Session,
    StorageError, UpdateSchema, ValidationErrors, Visibility,
};

pub mod domain;
pub use domain::{
    AsyncRepository, FilterSpec, Operator, Page, PaginationSpec, Repository, SortDirection,
    WriteOptions,
};

pub mod infra;

// Used by the field macros
#[doc(hidden)]
pub use chrono;
#[doc(hidden)]
pub use uuid;
