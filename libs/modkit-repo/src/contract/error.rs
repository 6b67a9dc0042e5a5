//! Contract error types for repositories
//!
//! These errors are storage-agnostic. Sessions speak `StorageError`,
//! repositories speak `RepoError`.

use std::fmt;
use uuid::Uuid;

/// A single invalid field reported by schema validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field path (`$` for the document root)
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every field that failed validation, in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Names of the offending fields
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.field.as_str())
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", joined.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Entity and read shape disagree on a field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot project {entity}: field '{field}' is not populated")]
pub struct MappingError {
    pub entity: &'static str,
    pub field: &'static str,
}

impl MappingError {
    pub fn missing(entity: &'static str, field: &'static str) -> Self {
        Self { entity, field }
    }
}

/// Errors reported by a storage session
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Uniqueness or other constraint violation
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The row addressed by a write does not exist
    #[error("row not found: {id}")]
    NotFound { id: Uuid },

    /// Anything else the backend reported (connection loss, driver errors...)
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Input shape rejected before reaching storage
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Filter or sort refers to an unknown or mistyped field
    #[error("invalid filter on field '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    /// Storage reported a uniqueness/constraint violation
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// Identifier does not resolve to a visible record
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: Uuid },

    /// Soft delete requested for an entity without a delete marker
    #[error("{resource} has no soft-delete field; request a hard delete")]
    SoftDeleteUnsupported { resource: &'static str },

    /// Entity/read-shape drift
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Unclassified storage failure, passed through untouched
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl RepoError {
    pub fn invalid_filter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: Uuid) -> Self {
        Self::NotFound { resource, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StorageError> for RepoError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Conflict(reason) => Self::Conflict { reason },
            StorageError::NotFound { id } => Self::NotFound {
                resource: "record",
                id,
            },
            other => Self::Storage(other),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
