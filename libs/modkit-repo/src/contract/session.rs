//! Session contracts - the seam between repositories and a storage engine
//!
//! A session is a unit of work: writes issued through it become durable on
//! `commit` and are discarded on `rollback`. Sessions are not meant to be
//! shared by concurrent operations; each call runs to completion before the
//! handle is reused.

use super::error::StorageError;
use super::fields::Record;
use crate::domain::filter::Predicate;
use crate::domain::pagination::Query;
use async_trait::async_trait;
use uuid::Uuid;

/// Whether soft-deleted rows take part in a read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Active,
    IncludeDeleted,
}

impl Visibility {
    pub fn admits<E: Record>(self, entity: &E) -> bool {
        self == Self::IncludeDeleted || !entity.is_deleted()
    }
}

/// How `delete` removes a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Set the delete marker; the row stays in storage
    #[default]
    Soft,
    /// Physically remove the row
    Hard,
}

/// Blocking storage session
pub trait Session<E: Record> {
    /// Store a new row, returning it with any generated fields
    fn insert(&mut self, entity: E) -> Result<E, StorageError>;

    fn get_by_id(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError>;

    /// Like `get_by_id`, but the row stays write-locked until the unit of
    /// work ends. Engines without row locks read it normally.
    fn get_for_update(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError> {
        self.get_by_id(id, visibility)
    }

    /// Rows matching `query.predicate`, ordered and windowed as requested
    fn query(&mut self, query: &Query) -> Result<Vec<E>, StorageError>;

    /// Unwindowed count of rows matching `predicate`
    fn count(&mut self, predicate: &Predicate) -> Result<u64, StorageError>;

    /// Overwrite an existing row
    fn update(&mut self, entity: E) -> Result<E, StorageError>;

    /// `Soft` persists the already-marked row, `Hard` removes it
    fn delete(&mut self, entity: E, mode: DeleteMode) -> Result<(), StorageError>;

    fn flush(&mut self) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self) -> Result<(), StorageError>;
}

/// Non-blocking storage session; same contract as [`Session`]
#[async_trait]
pub trait AsyncSession<E: Record>: Send {
    async fn insert(&mut self, entity: E) -> Result<E, StorageError>;

    async fn get_by_id(&mut self, id: Uuid, visibility: Visibility)
        -> Result<Option<E>, StorageError>;

    /// See [`Session::get_for_update`]
    async fn get_for_update(
        &mut self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<E>, StorageError> {
        AsyncSession::<E>::get_by_id(self, id, visibility).await
    }

    async fn query(&mut self, query: &Query) -> Result<Vec<E>, StorageError>;

    async fn count(&mut self, predicate: &Predicate) -> Result<u64, StorageError>;

    async fn update(&mut self, entity: E) -> Result<E, StorageError>;

    async fn delete(&mut self, entity: E, mode: DeleteMode) -> Result<(), StorageError>;

    async fn flush(&mut self) -> Result<(), StorageError>;

    async fn commit(&mut self) -> Result<(), StorageError>;

    async fn rollback(&mut self) -> Result<(), StorageError>;
}
