use super::{RepositoryCore, WriteOptions};
use crate::config::RepositoryConfig;
use crate::contract::{
    CreateSchema, DeleteMode, ReadSchema, Record, RepoResult, Session, UpdateSchema, Visibility,
};
use crate::domain::clock::Clock;
use crate::domain::filter::FilterSpec;
use crate::domain::pagination::{Page, PaginationSpec};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Blocking repository over any [`Session`]
///
/// `E` is the stored entity, `C`/`U`/`R` its create, update and read shapes.
pub struct Repository<E, C, U, R> {
    core: RepositoryCore<E, C, U, R>,
}

impl<E, C, U, R> Clone for Repository<E, C, U, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<E, C, U, R> Repository<E, C, U, R>
where
    E: Record,
    C: CreateSchema<E>,
    U: UpdateSchema<E>,
    R: ReadSchema<E>,
{
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            core: RepositoryCore::new(config),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.core.set_clock(clock);
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        self.core.config()
    }

    pub fn create<S: Session<E>>(&self, session: &mut S, input: C) -> RepoResult<R> {
        self.create_with(session, input, WriteOptions::default())
    }

    pub fn create_with<S: Session<E>>(
        &self,
        session: &mut S,
        input: C,
        options: WriteOptions,
    ) -> RepoResult<R> {
        let entity = self.core.prepare_create(input)?;
        debug!(entity = E::NAME, id = %entity.id(), "creating record");
        let stored = self.write(session, options, |s| Ok(s.insert(entity)?))?;
        self.core.project(&stored)
    }

    /// Active record by id; `None` when absent or soft-deleted
    pub fn get<S: Session<E>>(&self, session: &mut S, id: Uuid) -> RepoResult<Option<R>> {
        self.get_with(session, id, Visibility::Active)
    }

    pub fn get_with<S: Session<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        visibility: Visibility,
    ) -> RepoResult<Option<R>> {
        debug!(entity = E::NAME, %id, ?visibility, "fetching record");
        session
            .get_by_id(id, visibility)?
            .map(|entity| self.core.project(&entity))
            .transpose()
    }

    /// Like [`Repository::get`] but absence is a `NotFound` error
    pub fn get_required<S: Session<E>>(&self, session: &mut S, id: Uuid) -> RepoResult<R> {
        self.get(session, id)?.ok_or_else(|| self.core.not_found(id))
    }

    pub fn list<S: Session<E>>(
        &self,
        session: &mut S,
        filter: &FilterSpec,
        page: &PaginationSpec,
    ) -> RepoResult<Page<R>> {
        self.list_with(session, filter, page, Visibility::Active)
    }

    pub fn list_with<S: Session<E>>(
        &self,
        session: &mut S,
        filter: &FilterSpec,
        page: &PaginationSpec,
        visibility: Visibility,
    ) -> RepoResult<Page<R>> {
        let plan = self.core.plan_list(filter, page, visibility)?;
        let rows = session.query(&plan.query)?;
        let total = session.count(&plan.predicate)?;
        debug!(entity = E::NAME, rows = rows.len(), total, "listed records");
        self.core.page(&plan, &rows, total)
    }

    pub fn count<S: Session<E>>(&self, session: &mut S, filter: &FilterSpec) -> RepoResult<u64> {
        let predicate = self.core.predicate(filter, Visibility::Active)?;
        debug!(entity = E::NAME, conditions = filter.conditions().len(), "counting records");
        Ok(session.count(&predicate)?)
    }

    pub fn update<S: Session<E>>(&self, session: &mut S, id: Uuid, input: U) -> RepoResult<R> {
        self.update_with(session, id, input, WriteOptions::default())
    }

    /// The current row is read with a write lock unless `options` opts out
    pub fn update_with<S: Session<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        input: U,
        options: WriteOptions,
    ) -> RepoResult<R> {
        self.core.validate_update(&input)?;
        let lock = options.lock_row.unwrap_or(true);
        let stored = self.write(session, options, |s| {
            let current = self.fetch(s, id, Visibility::Active, lock)?;
            let entity = self.core.prepare_update(current, input);
            debug!(entity = E::NAME, %id, "updating record");
            Ok(s.update(entity)?)
        })?;
        self.core.project(&stored)
    }

    /// A hard delete also purges soft-deleted rows. Soft delete of an entity
    /// without a delete marker fails with `SoftDeleteUnsupported`.
    pub fn delete<S: Session<E>>(&self, session: &mut S, id: Uuid, mode: DeleteMode) -> RepoResult<()> {
        self.delete_with(session, id, mode, WriteOptions::default())
    }

    pub fn delete_with<S: Session<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        mode: DeleteMode,
        options: WriteOptions,
    ) -> RepoResult<()> {
        self.core.check_delete_mode(mode)?;
        let visibility = match mode {
            DeleteMode::Soft => Visibility::Active,
            DeleteMode::Hard => Visibility::IncludeDeleted,
        };
        let lock = options.lock_row.unwrap_or(false);
        self.write(session, options, |s| {
            let mut entity = self.fetch(s, id, visibility, lock)?;
            if mode == DeleteMode::Soft {
                self.core.prepare_soft_delete(&mut entity)?;
            }
            debug!(entity = E::NAME, %id, ?mode, "deleting record");
            Ok(s.delete(entity, mode)?)
        })
    }

    fn fetch<S: Session<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        visibility: Visibility,
        lock: bool,
    ) -> RepoResult<E> {
        let found = if lock {
            session.get_for_update(id, visibility)?
        } else {
            session.get_by_id(id, visibility)?
        };
        found.ok_or_else(|| self.core.not_found(id))
    }

    /// Run a write, then flush or commit; rolls back on failure when committing
    fn write<S, T>(
        &self,
        session: &mut S,
        options: WriteOptions,
        op: impl FnOnce(&mut S) -> RepoResult<T>,
    ) -> RepoResult<T>
    where
        S: Session<E>,
    {
        let auto_commit = self.core.auto_commit(options);
        let outcome = op(session).and_then(|value| {
            if auto_commit {
                session.commit()?;
            } else {
                session.flush()?;
            }
            Ok(value)
        });
        if outcome.is_err() && auto_commit {
            if let Err(rollback_err) = session.rollback() {
                warn!(entity = E::NAME, error = %rollback_err, "rollback after failed write also failed");
            }
        }
        outcome
    }
}
