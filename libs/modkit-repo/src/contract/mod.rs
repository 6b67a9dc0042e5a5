//! Contract layer - the types entities, schemas and storage engines plug into
//!
//! Storage-agnostic: nothing here depends on a particular database driver.

pub mod error;
pub mod fields;
pub mod schema;
pub mod session;

pub use error::{FieldError, MappingError, RepoError, RepoResult, StorageError, ValidationErrors};
pub use fields::{
    new_id, Audit, FieldDef, FieldKind, FieldValue, Identity, Record, SoftDelete,
    CREATED_AT_FIELD, DELETED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD,
};
pub use schema::{AuditMeta, CreateSchema, IdentityMeta, Patch, ReadSchema, Schema, UpdateSchema};
pub use session::{AsyncSession, DeleteMode, Session, Visibility};
