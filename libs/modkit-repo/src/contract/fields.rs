//! Identity and audit field sets
//!
//! An entity composes capability sets by implementing the matching traits:
//! [`Identity`] always, [`Audit`] for `created_at`/`updated_at`, [`SoftDelete`]
//! for `deleted_at`. [`Record`] then exposes the composed capabilities to the
//! repository through its `audit*`/`soft_delete*` accessors. The
//! `impl_identity!`, `impl_audit!`, `impl_soft_delete!` and
//! `record_capabilities!` macros cover the usual field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";
pub const DELETED_AT_FIELD: &str = "deleted_at";

/// New time-ordered identifier (UUIDv7)
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Surrogate identifier, generated at insert time and immutable afterwards
pub trait Identity {
    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
}

/// Creation / last-modification timestamps, filled by the repository
pub trait Audit {
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn updated_at(&self) -> Option<DateTime<Utc>>;
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Soft-delete marker
pub trait SoftDelete {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Declared kind of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    Uuid,
    Timestamp,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Uuid => "uuid",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Field declaration used to validate filters and sorts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    /// Enforced by the storage engine, reported as a conflict
    pub unique: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            unique: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn id() -> Self {
        Self::new(ID_FIELD, FieldKind::Uuid).unique()
    }

    pub const fn created_at() -> Self {
        Self::new(CREATED_AT_FIELD, FieldKind::Timestamp).nullable()
    }

    pub const fn updated_at() -> Self {
        Self::new(UPDATED_AT_FIELD, FieldKind::Timestamp).nullable()
    }

    pub const fn deleted_at() -> Self {
        Self::new(DELETED_AT_FIELD, FieldKind::Timestamp).nullable()
    }
}

/// A typed field value, used by filters and by engines evaluating them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    /// Kind of a non-null value
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(FieldKind::Bool),
            Self::Int(_) => Some(FieldKind::Int),
            Self::Float(_) => Some(FieldKind::Float),
            Self::Uuid(_) => Some(FieldKind::Uuid),
            Self::Timestamp(_) => Some(FieldKind::Timestamp),
            Self::Text(_) => Some(FieldKind::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value can be compared against a field of `kind`
    pub fn fits(&self, kind: FieldKind) -> bool {
        match (self.kind(), kind) {
            (None, _) => true,
            (Some(FieldKind::Int), FieldKind::Float) => true,
            // untagged deserialization reads uuid/timestamp literals as text first
            (Some(FieldKind::Text), FieldKind::Uuid | FieldKind::Timestamp) => {
                self.coerce(kind).kind() == Some(kind)
            }
            (Some(own), kind) => own == kind,
        }
    }

    /// Convert into the representation of `kind` where that is lossless
    pub fn coerce(&self, kind: FieldKind) -> FieldValue {
        match (self, kind) {
            (Self::Int(v), FieldKind::Float) => Self::Float(*v as f64),
            (Self::Text(s), FieldKind::Uuid) => match Uuid::parse_str(s) {
                Ok(id) => Self::Uuid(id),
                Err(_) => self.clone(),
            },
            (Self::Text(s), FieldKind::Timestamp) => match DateTime::parse_from_rfc3339(s) {
                Ok(at) => Self::Timestamp(at.with_timezone(&Utc)),
                Err(_) => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Ordering between two values of the same kind; `None` across kinds or with nulls
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A persistent entity as seen by the repository
///
/// Defaults describe an entity with identity only; entities composing the
/// audit or soft-delete sets override the matching accessors (see
/// [`record_capabilities!`](crate::record_capabilities)).
pub trait Record: Identity + Clone + Send + Sync + 'static {
    /// Entity name used in errors and logs
    const NAME: &'static str;

    /// Declared fields, including identity/audit fields
    fn fields() -> &'static [FieldDef];

    /// Current value of a declared field
    fn value(&self, field: &str) -> Option<FieldValue>;

    fn field(name: &str) -> Option<&'static FieldDef> {
        Self::fields().iter().find(|f| f.name == name)
    }

    fn is_audited() -> bool {
        false
    }

    fn audit(&self) -> Option<&dyn Audit> {
        None
    }

    fn audit_mut(&mut self) -> Option<&mut dyn Audit> {
        None
    }

    fn is_soft_deletable() -> bool {
        false
    }

    fn soft_delete(&self) -> Option<&dyn SoftDelete> {
        None
    }

    fn soft_delete_mut(&mut self) -> Option<&mut dyn SoftDelete> {
        None
    }

    fn is_deleted(&self) -> bool {
        self.soft_delete().is_some_and(|s| s.is_deleted())
    }
}

/// Implements [`Identity`] over an `id: Uuid` field
#[macro_export]
macro_rules! impl_identity {
    ($ty:ty) => {
        impl $crate::contract::fields::Identity for $ty {
            fn id(&self) -> $crate::uuid::Uuid {
                self.id
            }

            fn set_id(&mut self, id: $crate::uuid::Uuid) {
                self.id = id;
            }
        }
    };
}

/// Implements [`Audit`] over `created_at`/`updated_at: Option<DateTime<Utc>>` fields
#[macro_export]
macro_rules! impl_audit {
    ($ty:ty) => {
        impl $crate::contract::fields::Audit for $ty {
            fn created_at(&self) -> Option<$crate::chrono::DateTime<$crate::chrono::Utc>> {
                self.created_at
            }

            fn set_created_at(&mut self, at: $crate::chrono::DateTime<$crate::chrono::Utc>) {
                self.created_at = Some(at);
            }

            fn updated_at(&self) -> Option<$crate::chrono::DateTime<$crate::chrono::Utc>> {
                self.updated_at
            }

            fn set_updated_at(&mut self, at: $crate::chrono::DateTime<$crate::chrono::Utc>) {
                self.updated_at = Some(at);
            }
        }
    };
}

/// Implements [`SoftDelete`] over a `deleted_at: Option<DateTime<Utc>>` field
#[macro_export]
macro_rules! impl_soft_delete {
    ($ty:ty) => {
        impl $crate::contract::fields::SoftDelete for $ty {
            fn deleted_at(&self) -> Option<$crate::chrono::DateTime<$crate::chrono::Utc>> {
                self.deleted_at
            }

            fn set_deleted_at(&mut self, at: Option<$crate::chrono::DateTime<$crate::chrono::Utc>>) {
                self.deleted_at = at;
            }
        }
    };
}

/// Expands to the [`Record`] accessors for the listed capability sets.
/// Use inside an `impl Record for ...` block: `record_capabilities!(audit, soft_delete);`
#[macro_export]
macro_rules! record_capabilities {
    (@cap audit) => {
        fn is_audited() -> bool {
            true
        }

        fn audit(&self) -> Option<&dyn $crate::contract::fields::Audit> {
            Some(self)
        }

        fn audit_mut(&mut self) -> Option<&mut dyn $crate::contract::fields::Audit> {
            Some(self)
        }
    };
    (@cap soft_delete) => {
        fn is_soft_deletable() -> bool {
            true
        }

        fn soft_delete(&self) -> Option<&dyn $crate::contract::fields::SoftDelete> {
            Some(self)
        }

        fn soft_delete_mut(&mut self) -> Option<&mut dyn $crate::contract::fields::SoftDelete> {
            Some(self)
        }
    };
    ($($cap:ident),+ $(,)?) => {
        $($crate::record_capabilities!(@cap $cap);)+
    };
}
