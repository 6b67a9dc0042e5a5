//! Transactional SeaORM session

use super::mapper::{column, condition, storage_error};
use crate::contract::{
    AsyncSession, DeleteMode, Record, StorageError, Visibility, DELETED_AT_FIELD, ID_FIELD,
};
use crate::domain::filter::Predicate;
use crate::domain::pagination::Query;
use anyhow::anyhow;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
    TransactionTrait,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Binds a [`Record`] to its SeaORM entity
///
/// Writes go through [`SeaOrmRecord::to_active_model`] with every column
/// `Set`; reads come back through [`SeaOrmRecord::from_model`].
pub trait SeaOrmRecord: Record {
    type Entity: EntityTrait;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send + 'static;

    fn to_active_model(&self) -> Self::ActiveModel;

    fn from_model(model: <Self::Entity as EntityTrait>::Model) -> Self;
}

/// Unit of work over a database connection
///
/// The transaction begins on first use. Writes are visible to later reads
/// through the same session; `commit` makes them durable, `rollback` or
/// dropping the session discards them.
pub struct SeaOrmSession {
    db: Arc<DatabaseConnection>,
    txn: Option<DatabaseTransaction>,
}

impl SeaOrmSession {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db, txn: None }
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    async fn txn(&mut self) -> Result<&DatabaseTransaction, StorageError> {
        if self.txn.is_none() {
            let txn = self.db.begin().await.map_err(|e| storage_error(e, None))?;
            debug!("transaction started");
            self.txn = Some(txn);
        }
        self.txn
            .as_ref()
            .ok_or_else(|| StorageError::Backend(anyhow!("transaction not available")))
    }
}

/// Lookup of one row by id, `SELECT ... FOR UPDATE` when `lock` is set
pub fn select_by_id<E: SeaOrmRecord>(
    id: Uuid,
    visibility: Visibility,
    lock: bool,
) -> Result<Select<E::Entity>, StorageError>
where
    ColumnOf<E>: FromStr,
{
    let mut select = E::Entity::find().filter(column::<E::Entity>(ID_FIELD)?.eq(id));
    if visibility == Visibility::Active && E::is_soft_deletable() {
        select = select.filter(column::<E::Entity>(DELETED_AT_FIELD)?.is_null());
    }
    if lock {
        select = select.lock_exclusive();
    }
    Ok(select)
}

impl SeaOrmSession {
    async fn fetch<E: SeaOrmRecord>(&mut self, select: Select<E::Entity>) -> Result<Option<E>, StorageError>
    where
        ModelOf<E>: Sync,
    {
        let txn = self.txn().await?;
        let model = select.one(txn).await.map_err(|e| storage_error(e, None))?;
        Ok(model.map(E::from_model))
    }
}

type ModelOf<E> = <<E as SeaOrmRecord>::Entity as EntityTrait>::Model;
type ColumnOf<E> = <<E as SeaOrmRecord>::Entity as EntityTrait>::Column;

#[async_trait]
impl<E> AsyncSession<E> for SeaOrmSession
where
    E: SeaOrmRecord,
    ModelOf<E>: IntoActiveModel<E::ActiveModel> + Sync,
    ColumnOf<E>: FromStr,
{
    async fn insert(&mut self, entity: E) -> Result<E, StorageError> {
        let active = entity.to_active_model();
        let txn = self.txn().await?;
        let model = active.insert(txn).await.map_err(|e| storage_error(e, None))?;
        Ok(E::from_model(model))
    }

    async fn get_by_id(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError> {
        let select = select_by_id::<E>(id, visibility, false)?;
        self.fetch::<E>(select).await
    }

    async fn get_for_update(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError> {
        let select = select_by_id::<E>(id, visibility, true)?;
        debug!(entity = E::NAME, %id, "locking row");
        self.fetch::<E>(select).await
    }

    async fn query(&mut self, query: &Query) -> Result<Vec<E>, StorageError> {
        let mut select = E::Entity::find().filter(condition::<E::Entity>(&query.predicate)?);
        for order in &query.order {
            select = select.order_by(column::<E::Entity>(order.field)?, order.direction.into());
        }
        if query.offset > 0 {
            select = select.offset(query.offset);
        }
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }
        let txn = self.txn().await?;
        let models = select.all(txn).await.map_err(|e| storage_error(e, None))?;
        Ok(models.into_iter().map(E::from_model).collect())
    }

    async fn count(&mut self, predicate: &Predicate) -> Result<u64, StorageError> {
        let select = E::Entity::find().filter(condition::<E::Entity>(predicate)?);
        let txn = self.txn().await?;
        select.count(txn).await.map_err(|e| storage_error(e, None))
    }

    async fn update(&mut self, entity: E) -> Result<E, StorageError> {
        let id = entity.id();
        let active = entity.to_active_model();
        let txn = self.txn().await?;
        let model = active.update(txn).await.map_err(|e| storage_error(e, Some(id)))?;
        Ok(E::from_model(model))
    }

    async fn delete(&mut self, entity: E, mode: DeleteMode) -> Result<(), StorageError> {
        let id = entity.id();
        match mode {
            DeleteMode::Soft => {
                AsyncSession::<E>::update(self, entity).await?;
            }
            DeleteMode::Hard => {
                let id_column = column::<E::Entity>(ID_FIELD)?;
                let txn = self.txn().await?;
                let result = E::Entity::delete_many()
                    .filter(id_column.eq(id))
                    .exec(txn)
                    .await
                    .map_err(|e| storage_error(e, Some(id)))?;
                if result.rows_affected == 0 {
                    return Err(StorageError::NotFound { id });
                }
            }
        }
        Ok(())
    }

    /// Statements run as they are issued; nothing is buffered client side
    async fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        if let Some(txn) = self.txn.take() {
            txn.commit().await.map_err(|e| storage_error(e, None))?;
            debug!("transaction committed");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        if let Some(txn) = self.txn.take() {
            txn.rollback().await.map_err(|e| storage_error(e, None))?;
            debug!("transaction rolled back");
        }
        Ok(())
    }
}
