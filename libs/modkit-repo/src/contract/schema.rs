//! Schema contracts - the validated shapes crossing the repository boundary
//!
//! Each entity pairs with three shapes:
//! - a create shape ([`CreateSchema`]) carrying caller-supplied fields only
//! - an update shape ([`UpdateSchema`]) where every field is a [`Patch`]
//! - a read shape ([`ReadSchema`]) projecting the entity plus identity/audit fields

use super::error::{MappingError, ValidationErrors};
use super::fields::{Record, CREATED_AT_FIELD, UPDATED_AT_FIELD};
use crate::domain::validation;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// A validated boundary shape
///
/// Validation runs the optional JSON Schema first and then the
/// shape's own [`Schema::check`]; all failures are reported together.
pub trait Schema: Serialize + DeserializeOwned + Sized {
    /// JSON Schema describing valid instances
    fn json_schema() -> Option<serde_json::Value> {
        None
    }

    /// Extra rules the JSON Schema cannot express
    fn check(&self, _errors: &mut ValidationErrors) {}

    fn validate(&self) -> Result<(), ValidationErrors> {
        let raw = serde_json::to_value(self)
            .map_err(|e| ValidationErrors::single("$", format!("not serializable: {e}")))?;
        let mut errors = match Self::json_schema() {
            Some(schema) => validation::collect_schema_errors(&raw, &schema),
            None => ValidationErrors::new(),
        };
        self.check(&mut errors);
        errors.into_result()
    }

    /// Build an instance from raw field values
    fn from_value(raw: serde_json::Value) -> Result<Self, ValidationErrors> {
        if let Some(schema) = Self::json_schema() {
            validation::collect_schema_errors(&raw, &schema).into_result()?;
        }
        let parsed: Self = serde_json::from_value(raw)
            .map_err(|e| ValidationErrors::single("$", e.to_string()))?;
        let mut errors = ValidationErrors::new();
        parsed.check(&mut errors);
        errors.into_result()?;
        Ok(parsed)
    }
}

/// Shape accepted by `create`
pub trait CreateSchema<E: Record>: Schema {
    /// Entity with caller fields populated; identity and audit fields are
    /// left for the repository to fill
    fn to_entity(self) -> E;
}

/// Shape accepted by `update`
pub trait UpdateSchema<E: Record>: Schema {
    /// Copy every present field onto `entity`, leaving the rest untouched
    fn apply_update(self, entity: &mut E);
}

/// Shape returned to callers
pub trait ReadSchema<E: Record>: Sized {
    fn from_entity(entity: &E) -> Result<Self, MappingError>;
}

/// Presence-tracked update field
///
/// `Absent` leaves the target unchanged. `Set(v)` overwrites it; for nullable
/// fields use `Patch<Option<T>>`, where `Set(None)` clears.
///
/// Declare with `#[serde(default, skip_serializing_if = "Patch::is_absent")]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Overwrite `target` when present
    pub fn apply_to(self, target: &mut T) {
        if let Self::Set(v) = self {
            *target = v;
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(v: T) -> Self {
        Self::Set(v)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(v) => v.serialize(serializer),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // only reached when the key is present; absence comes from #[serde(default)]
        T::deserialize(deserializer).map(Self::Set)
    }
}

/// Identity part of a read shape, for `#[serde(flatten)]` composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMeta {
    pub id: Uuid,
}

impl IdentityMeta {
    pub fn of<E: Record>(entity: &E) -> Self {
        Self { id: entity.id() }
    }
}

/// Identity and audit part of a read shape, for `#[serde(flatten)]` composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMeta {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AuditMeta {
    /// Fails when the entity is not audited or its timestamps were never populated
    pub fn of<E: Record>(entity: &E) -> Result<Self, MappingError> {
        let audit = entity
            .audit()
            .ok_or_else(|| MappingError::missing(E::NAME, CREATED_AT_FIELD))?;
        let created_at = audit
            .created_at()
            .ok_or_else(|| MappingError::missing(E::NAME, CREATED_AT_FIELD))?;
        let updated_at = audit
            .updated_at()
            .ok_or_else(|| MappingError::missing(E::NAME, UPDATED_AT_FIELD))?;

        Ok(Self {
            id: entity.id(),
            created_at,
            updated_at,
            deleted_at: entity.soft_delete().and_then(|s| s.deleted_at()),
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
