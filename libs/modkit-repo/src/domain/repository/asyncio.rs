use super::{RepositoryCore, WriteOptions};
use crate::config::RepositoryConfig;
use crate::contract::{
    AsyncSession, CreateSchema, DeleteMode, ReadSchema, Record, RepoError, RepoResult,
    UpdateSchema, Visibility,
};
use crate::domain::clock::Clock;
use crate::domain::filter::FilterSpec;
use crate::domain::pagination::{Page, PaginationSpec};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Non-blocking counterpart of [`super::Repository`]
pub struct AsyncRepository<E, C, U, R> {
    core: RepositoryCore<E, C, U, R>,
}

impl<E, C, U, R> Clone for AsyncRepository<E, C, U, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<E, C, U, R> AsyncRepository<E, C, U, R>
where
    E: Record,
    C: CreateSchema<E> + Send,
    U: UpdateSchema<E> + Send,
    R: ReadSchema<E> + Send,
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

    pub async fn create<S: AsyncSession<E>>(&self, session: &mut S, input: C) -> RepoResult<R> {
        self.create_with(session, input, WriteOptions::default()).await
    }

    pub async fn create_with<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        input: C,
        options: WriteOptions,
    ) -> RepoResult<R> {
        let entity = self.core.prepare_create(input)?;
        let auto_commit = self.core.auto_commit(options);
        debug!(entity = E::NAME, id = %entity.id(), "creating record");
        let outcome = async {
            let stored = session.insert(entity).await?;
            self.finish(session, auto_commit).await?;
            Ok::<_, RepoError>(stored)
        }
        .await;
        let stored = self.settle(session, auto_commit, outcome).await?;
        self.core.project(&stored)
    }

    pub async fn get<S: AsyncSession<E>>(&self, session: &mut S, id: Uuid) -> RepoResult<Option<R>> {
        self.get_with(session, id, Visibility::Active).await
    }

    pub async fn get_with<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        visibility: Visibility,
    ) -> RepoResult<Option<R>> {
        debug!(entity = E::NAME, %id, ?visibility, "fetching record");
        session
            .get_by_id(id, visibility)
            .await?
            .map(|entity| self.core.project(&entity))
            .transpose()
    }

    pub async fn get_required<S: AsyncSession<E>>(&self, session: &mut S, id: Uuid) -> RepoResult<R> {
        self.get(session, id)
            .await?
            .ok_or_else(|| self.core.not_found(id))
    }

    pub async fn list<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        filter: &FilterSpec,
        page: &PaginationSpec,
    ) -> RepoResult<Page<R>> {
        self.list_with(session, filter, page, Visibility::Active).await
    }

    pub async fn list_with<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        filter: &FilterSpec,
        page: &PaginationSpec,
        visibility: Visibility,
    ) -> RepoResult<Page<R>> {
        let plan = self.core.plan_list(filter, page, visibility)?;
        let rows = session.query(&plan.query).await?;
        let total = session.count(&plan.predicate).await?;
        debug!(entity = E::NAME, rows = rows.len(), total, "listed records");
        self.core.page(&plan, &rows, total)
    }

    pub async fn count<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        filter: &FilterSpec,
    ) -> RepoResult<u64> {
        let predicate = self.core.predicate(filter, Visibility::Active)?;
        debug!(entity = E::NAME, conditions = filter.conditions().len(), "counting records");
        Ok(session.count(&predicate).await?)
    }

    pub async fn update<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        input: U,
    ) -> RepoResult<R> {
        self.update_with(session, id, input, WriteOptions::default()).await
    }

    /// The current row is read with a write lock unless `options` opts out
    pub async fn update_with<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        input: U,
        options: WriteOptions,
    ) -> RepoResult<R> {
        self.core.validate_update(&input)?;
        let auto_commit = self.core.auto_commit(options);
        let lock = options.lock_row.unwrap_or(true);
        let outcome = async {
            let current = self.fetch(session, id, Visibility::Active, lock).await?;
            let entity = self.core.prepare_update(current, input);
            debug!(entity = E::NAME, %id, "updating record");
            let stored = session.update(entity).await?;
            self.finish(session, auto_commit).await?;
            Ok::<_, RepoError>(stored)
        }
        .await;
        let stored = self.settle(session, auto_commit, outcome).await?;
        self.core.project(&stored)
    }

    /// See [`super::Repository::delete`]
    pub async fn delete<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        mode: DeleteMode,
    ) -> RepoResult<()> {
        self.delete_with(session, id, mode, WriteOptions::default()).await
    }

    pub async fn delete_with<S: AsyncSession<E>>(
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
        let auto_commit = self.core.auto_commit(options);
        let lock = options.lock_row.unwrap_or(false);
        let outcome = async {
            let mut entity = self.fetch(session, id, visibility, lock).await?;
            if mode == DeleteMode::Soft {
                self.core.prepare_soft_delete(&mut entity)?;
            }
            debug!(entity = E::NAME, %id, ?mode, "deleting record");
            session.delete(entity, mode).await?;
            self.finish(session, auto_commit).await?;
            Ok::<_, RepoError>(())
        }
        .await;
        self.settle(session, auto_commit, outcome).await
    }

    async fn fetch<S: AsyncSession<E>>(
        &self,
        session: &mut S,
        id: Uuid,
        visibility: Visibility,
        lock: bool,
    ) -> RepoResult<E> {
        let found = if lock {
            session.get_for_update(id, visibility).await?
        } else {
            session.get_by_id(id, visibility).await?
        };
        found.ok_or_else(|| self.core.not_found(id))
    }

    async fn finish<S: AsyncSession<E>>(&self, session: &mut S, auto_commit: bool) -> RepoResult<()> {
        if auto_commit {
            session.commit().await?;
        } else {
            session.flush().await?;
        }
        Ok(())
    }

    async fn settle<S: AsyncSession<E>, T>(
        &self,
        session: &mut S,
        auto_commit: bool,
        outcome: RepoResult<T>,
    ) -> RepoResult<T> {
        if outcome.is_err() && auto_commit {
            if let Err(rollback_err) = session.rollback().await {
                warn!(entity = E::NAME, error = %rollback_err, "rollback after failed write also failed");
            }
        }
        outcome
    }
}
