//! Generic repositories
//!
//! [`Repository`] (blocking) and [`AsyncRepository`] expose the same
//! operations with the same results. Everything that is not a storage call
//! (validation, entity mapping, identity/audit stamping, predicate and
//! window building, read-shape projection) lives in [`RepositoryCore`] and is
//! shared; the variants differ only in how they call the session.

mod asyncio;
mod sync;

pub use asyncio::AsyncRepository;
pub use sync::Repository;

use super::clock::{Clock, MonotonicClock};
use super::filter::{build_predicate, FilterSpec, Predicate};
use super::pagination::{apply_pagination, Page, PaginationSpec, Query};
use crate::config::RepositoryConfig;
use crate::contract::{
    new_id, CreateSchema, DeleteMode, ReadSchema, Record, RepoError, RepoResult, UpdateSchema,
    Visibility,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Per-call overrides for a write
///
/// Unset fields keep the repository's behaviour: `auto_commit` comes from
/// [`RepositoryConfig`], the row is locked by `update` and not by `delete`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub auto_commit: Option<bool>,
    pub lock_row: Option<bool>,
}

impl WriteOptions {
    /// Commit this write regardless of configuration
    pub fn commit() -> Self {
        Self {
            auto_commit: Some(true),
            ..Self::default()
        }
    }

    /// Only flush; the caller commits
    pub fn flush() -> Self {
        Self {
            auto_commit: Some(false),
            ..Self::default()
        }
    }

    pub fn with_row_lock(mut self, lock: bool) -> Self {
        self.lock_row = Some(lock);
        self
    }
}

/// Prepared `list` request
pub(crate) struct ListPlan {
    pub query: Query,
    pub predicate: Predicate,
}

/// Storage-free half of a repository, bound to an entity and its shapes
pub struct RepositoryCore<E, C, U, R> {
    config: RepositoryConfig,
    clock: Arc<dyn Clock>,
    _marker: PhantomData<fn() -> (E, C, U, R)>,
}

impl<E, C, U, R> Clone for RepositoryCore<E, C, U, R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            clock: self.clock.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E, C, U, R> RepositoryCore<E, C, U, R>
where
    E: Record,
    C: CreateSchema<E>,
    U: UpdateSchema<E>,
    R: ReadSchema<E>,
{
    pub fn new(config: RepositoryConfig) -> Self {
        if let Err(err) = config.validate() {
            warn!(entity = E::NAME, error = %err, "page size settings out of range, flooring at 1");
        }
        Self {
            config,
            clock: Arc::new(MonotonicClock),
            _marker: PhantomData,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    /// Validated entity with a fresh identifier and creation stamps
    pub fn prepare_create(&self, input: C) -> RepoResult<E> {
        input.validate()?;
        let mut entity = input.to_entity();
        entity.set_id(new_id());
        if let Some(audit) = entity.audit_mut() {
            let now = self.clock.now();
            audit.set_created_at(now);
            audit.set_updated_at(now);
        }
        if let Some(marker) = entity.soft_delete_mut() {
            marker.set_deleted_at(None);
        }
        Ok(entity)
    }

    pub fn validate_update(&self, input: &U) -> RepoResult<()> {
        input.validate().map_err(RepoError::from)
    }

    /// Apply the present fields of `input` and move `updated_at` forward
    pub fn prepare_update(&self, mut entity: E, input: U) -> E {
        input.apply_update(&mut entity);
        self.touch(&mut entity);
        entity
    }

    /// Soft delete needs a delete marker on the entity
    pub fn check_delete_mode(&self, mode: DeleteMode) -> RepoResult<()> {
        if mode == DeleteMode::Soft && !E::is_soft_deletable() {
            return Err(RepoError::SoftDeleteUnsupported { resource: E::NAME });
        }
        Ok(())
    }

    /// Set the delete marker and move `updated_at` forward
    pub fn prepare_soft_delete(&self, entity: &mut E) -> RepoResult<()> {
        let now = self.clock.now();
        let marker = entity
            .soft_delete_mut()
            .ok_or(RepoError::SoftDeleteUnsupported { resource: E::NAME })?;
        marker.set_deleted_at(Some(now));
        if let Some(audit) = entity.audit_mut() {
            audit.set_updated_at(now);
        }
        Ok(())
    }

    pub(crate) fn auto_commit(&self, options: WriteOptions) -> bool {
        options.auto_commit.unwrap_or(self.config.auto_commit)
    }

    fn touch(&self, entity: &mut E) {
        if let Some(audit) = entity.audit_mut() {
            audit.set_updated_at(self.clock.now());
        }
    }

    pub fn project(&self, entity: &E) -> RepoResult<R> {
        R::from_entity(entity).map_err(RepoError::from)
    }

    pub fn project_all(&self, entities: &[E]) -> RepoResult<Vec<R>> {
        entities.iter().map(|e| self.project(e)).collect()
    }

    pub fn predicate(&self, filter: &FilterSpec, visibility: Visibility) -> RepoResult<Predicate> {
        build_predicate::<E>(filter, visibility)
    }

    pub(crate) fn plan_list(
        &self,
        filter: &FilterSpec,
        page: &PaginationSpec,
        visibility: Visibility,
    ) -> RepoResult<ListPlan> {
        let predicate = self.predicate(filter, visibility)?;
        let query = apply_pagination::<E>(
            Query::new(predicate.clone()),
            page,
            self.config.page_limits(),
        )?;
        Ok(ListPlan { query, predicate })
    }

    pub(crate) fn page(&self, plan: &ListPlan, rows: &[E], total: u64) -> RepoResult<Page<R>> {
        Ok(Page {
            items: self.project_all(rows)?,
            total,
            offset: plan.query.offset,
            limit: plan.query.limit.unwrap_or(self.config.max_page_size),
        })
    }

    pub fn not_found(&self, id: Uuid) -> RepoError {
        RepoError::not_found(E::NAME, id)
    }
}
