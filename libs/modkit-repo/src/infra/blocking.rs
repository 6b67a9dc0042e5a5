//! Blocking facade over an asynchronous session

use crate::contract::{AsyncSession, DeleteMode, Record, Session, StorageError, Visibility};
use crate::domain::filter::Predicate;
use crate::domain::pagination::Query;
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

/// Drives an [`AsyncSession`] to completion on a Tokio runtime so it can be
/// used where a [`Session`] is expected.
///
/// Must not be used from inside an async context: `block_on` panics when
/// called on a runtime worker thread.
pub struct BlockingSession<S> {
    runtime: Arc<Runtime>,
    inner: S,
}

impl<S> BlockingSession<S> {
    pub fn new(runtime: Arc<Runtime>, inner: S) -> Self {
        Self { runtime, inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<E, S> Session<E> for BlockingSession<S>
where
    E: Record,
    S: AsyncSession<E>,
{
    fn insert(&mut self, entity: E) -> Result<E, StorageError> {
        self.runtime.block_on(AsyncSession::<E>::insert(&mut self.inner, entity))
    }

    fn get_by_id(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError> {
        self.runtime
            .block_on(AsyncSession::<E>::get_by_id(&mut self.inner, id, visibility))
    }

    fn get_for_update(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError> {
        self.runtime
            .block_on(AsyncSession::<E>::get_for_update(&mut self.inner, id, visibility))
    }

    fn query(&mut self, query: &Query) -> Result<Vec<E>, StorageError> {
        self.runtime.block_on(AsyncSession::<E>::query(&mut self.inner, query))
    }

    fn count(&mut self, predicate: &Predicate) -> Result<u64, StorageError> {
        self.runtime.block_on(AsyncSession::<E>::count(&mut self.inner, predicate))
    }

    fn update(&mut self, entity: E) -> Result<E, StorageError> {
        self.runtime.block_on(AsyncSession::<E>::update(&mut self.inner, entity))
    }

    fn delete(&mut self, entity: E, mode: DeleteMode) -> Result<(), StorageError> {
        self.runtime
            .block_on(AsyncSession::<E>::delete(&mut self.inner, entity, mode))
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.runtime.block_on(AsyncSession::<E>::flush(&mut self.inner))
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.runtime.block_on(AsyncSession::<E>::commit(&mut self.inner))
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        self.runtime.block_on(AsyncSession::<E>::rollback(&mut self.inner))
    }
}
