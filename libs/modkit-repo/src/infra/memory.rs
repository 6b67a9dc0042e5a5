//! In-memory storage engine
//!
//! [`MemoryStore`] holds committed rows per entity type. Each
//! [`MemorySession`] keeps its own pending writes, visible only to itself,
//! until `commit` moves them into the store under a single write lock.
//! Unique fields are enforced both when a write is issued and at commit.

use crate::contract::{
    AsyncSession, DeleteMode, FieldValue, Record, Session, StorageError, Visibility, ID_FIELD,
};
use crate::domain::filter::Predicate;
use crate::domain::pagination::{OrderBy, Query, SortDirection};
use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

type Table<E> = BTreeMap<Uuid, E>;
type Tables = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Shared committed state; cloning yields another handle to the same store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// New unit of work over this store
    pub fn session(&self) -> MemorySession {
        MemorySession {
            store: self.clone(),
            pending: HashMap::new(),
        }
    }

    /// Committed rows of `E`, soft-deleted ones included
    pub fn len<E: Record>(&self) -> usize {
        let tables = self.tables.read();
        table::<E>(&tables).map_or(0, BTreeMap::len)
    }

    pub fn is_empty<E: Record>(&self) -> bool {
        self.len::<E>() == 0
    }

    fn snapshot<E: Record>(&self) -> Table<E> {
        let tables = self.tables.read();
        table::<E>(&tables).cloned().unwrap_or_default()
    }

    fn committed<E: Record>(&self, id: Uuid) -> Option<E> {
        let tables = self.tables.read();
        table::<E>(&tables).and_then(|t| t.get(&id).cloned())
    }
}

fn table<E: Record>(tables: &Tables) -> Option<&Table<E>> {
    tables
        .get(&TypeId::of::<E>())
        .and_then(|t| t.downcast_ref::<Table<E>>())
}

/// Pending writes of one entity type, type-erased so a session can span many
trait PendingTable: Send {
    fn check(&self, tables: &Tables) -> Result<(), StorageError>;
    fn apply(self: Box<Self>, tables: &mut Tables);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A staged write; updates only land on rows that still exist at commit
enum Pending<E> {
    Insert(E),
    Update(E),
    Remove,
}

impl<E> Pending<E> {
    fn row(&self) -> Option<&E> {
        match self {
            Pending::Insert(row) | Pending::Update(row) => Some(row),
            Pending::Remove => None,
        }
    }
}

struct Overlay<E>(BTreeMap<Uuid, Pending<E>>);

impl<E> Default for Overlay<E> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<E: Record> Overlay<E> {
    /// Stage a changed row, keeping an uncommitted insert an insert
    fn put(&mut self, row: E) {
        let id = row.id();
        let staged = match self.0.get(&id) {
            Some(Pending::Insert(_)) => Pending::Insert(row),
            _ => Pending::Update(row),
        };
        self.0.insert(id, staged);
    }

    /// Stage a removal; a row inserted by this session simply disappears
    fn remove(&mut self, id: Uuid) {
        if let Some(Pending::Insert(_)) = self.0.get(&id) {
            self.0.remove(&id);
        } else {
            self.0.insert(id, Pending::Remove);
        }
    }
}

impl<E: Record> PendingTable for Overlay<E> {
    fn check(&self, tables: &Tables) -> Result<(), StorageError> {
        let committed = table::<E>(tables);
        let exists = |id: &Uuid| committed.is_some_and(|t| t.contains_key(id));
        for (id, pending) in &self.0 {
            match pending {
                Pending::Insert(_) if exists(id) => {
                    return Err(StorageError::Conflict(format!("{} {id} already exists", E::NAME)));
                }
                Pending::Update(_) if !exists(id) => {
                    return Err(StorageError::NotFound { id: *id });
                }
                _ => {}
            }
        }

        let mut merged = committed.cloned().unwrap_or_default();
        merge(&mut merged, self);
        match self
            .0
            .values()
            .filter_map(Pending::row)
            .find_map(|row| unique_violation(merged.values(), row))
        {
            Some(reason) => Err(StorageError::Conflict(reason)),
            None => Ok(()),
        }
    }

    fn apply(self: Box<Self>, tables: &mut Tables) {
        let slot = tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Table::<E>::new()));
        if let Some(table) = slot.downcast_mut::<Table<E>>() {
            merge(table, &self);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn merge<E: Record>(table: &mut Table<E>, overlay: &Overlay<E>) {
    for (id, pending) in &overlay.0 {
        match pending.row() {
            Some(row) => {
                table.insert(*id, row.clone());
            }
            None => {
                table.remove(id);
            }
        }
    }
}

/// First unique field of `candidate` already held by another row
fn unique_violation<'a, E: Record>(
    rows: impl Iterator<Item = &'a E> + Clone,
    candidate: &E,
) -> Option<String> {
    E::fields()
        .iter()
        .filter(|def| def.unique && def.name != ID_FIELD)
        .find_map(|def| {
            let value = candidate.value(def.name).filter(|v| !v.is_null())?;
            rows.clone()
                .filter(|row| row.id() != candidate.id())
                .any(|row| {
                    row.value(def.name)
                        .is_some_and(|other| other.compare(&value) == Some(Ordering::Equal))
                })
                .then(|| format!("{} with {} = {value} already exists", E::NAME, def.name))
        })
}

/// Order rows the way the SQL engines do: nulls sort lowest
fn compare_rows<E: Record>(a: &E, b: &E, order: &[OrderBy]) -> Ordering {
    for o in order {
        let left = a.value(o.field).unwrap_or(FieldValue::Null);
        let right = b.value(o.field).unwrap_or(FieldValue::Null);
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(&right).unwrap_or(Ordering::Equal),
        };
        let ord = match o.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Unit of work over a [`MemoryStore`]
pub struct MemorySession {
    store: MemoryStore,
    pending: HashMap<TypeId, Box<dyn PendingTable>>,
}

impl MemorySession {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Whether writes are waiting for `commit`
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn overlay<E: Record>(&self) -> Option<&Overlay<E>> {
        self.pending
            .get(&TypeId::of::<E>())
            .and_then(|p| p.as_any().downcast_ref::<Overlay<E>>())
    }

    fn overlay_mut<E: Record>(&mut self) -> Result<&mut Overlay<E>, StorageError> {
        self.pending
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Overlay::<E>::default()))
            .as_any_mut()
            .downcast_mut::<Overlay<E>>()
            .ok_or_else(|| StorageError::Backend(anyhow!("pending table type mismatch for {}", E::NAME)))
    }

    /// Row as this session sees it
    fn lookup<E: Record>(&self, id: Uuid) -> Option<E> {
        match self.overlay::<E>().and_then(|o| o.0.get(&id)) {
            Some(pending) => pending.row().cloned(),
            None => self.store.committed(id),
        }
    }

    /// Committed rows merged with this session's pending writes
    fn rows<E: Record>(&self) -> Table<E> {
        let mut rows = self.store.snapshot::<E>();
        if let Some(overlay) = self.overlay::<E>() {
            merge(&mut rows, overlay);
        }
        rows
    }

    fn matching<E: Record>(&self, predicate: &Predicate) -> Vec<E> {
        self.rows::<E>()
            .into_values()
            .filter(|row| predicate.matches(row))
            .collect()
    }

    fn unique<E: Record>(&self, entity: &E) -> Result<(), StorageError> {
        match unique_violation(self.rows::<E>().values(), entity) {
            Some(reason) => Err(StorageError::Conflict(reason)),
            None => Ok(()),
        }
    }

    fn stage<E: Record>(&mut self, entity: E) -> Result<E, StorageError> {
        self.unique(&entity)?;
        self.overlay_mut::<E>()?.put(entity.clone());
        Ok(entity)
    }
}

impl<E: Record> Session<E> for MemorySession {
    fn insert(&mut self, entity: E) -> Result<E, StorageError> {
        if self.lookup::<E>(entity.id()).is_some() {
            return Err(StorageError::Conflict(format!(
                "{} {} already exists",
                E::NAME,
                entity.id()
            )));
        }
        self.unique(&entity)?;
        let overlay = self.overlay_mut::<E>()?;
        // re-inserting a row this session removed replaces the committed one
        let staged = match overlay.0.get(&entity.id()) {
            Some(Pending::Remove) => Pending::Update(entity.clone()),
            _ => Pending::Insert(entity.clone()),
        };
        overlay.0.insert(entity.id(), staged);
        Ok(entity)
    }

    fn get_by_id(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError> {
        Ok(self
            .lookup::<E>(id)
            .filter(|entity| visibility.admits(entity)))
    }

    fn query(&mut self, query: &Query) -> Result<Vec<E>, StorageError> {
        let mut rows = self.matching::<E>(&query.predicate);
        rows.sort_by(|a, b| compare_rows(a, b, &query.order));
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn count(&mut self, predicate: &Predicate) -> Result<u64, StorageError> {
        Ok(self.matching::<E>(predicate).len() as u64)
    }

    fn update(&mut self, entity: E) -> Result<E, StorageError> {
        if self.lookup::<E>(entity.id()).is_none() {
            return Err(StorageError::NotFound { id: entity.id() });
        }
        self.stage(entity)
    }

    fn delete(&mut self, entity: E, mode: DeleteMode) -> Result<(), StorageError> {
        let id = entity.id();
        if self.lookup::<E>(id).is_none() {
            return Err(StorageError::NotFound { id });
        }
        match mode {
            DeleteMode::Soft => {
                self.stage(entity)?;
            }
            DeleteMode::Hard => {
                self.overlay_mut::<E>()?.remove(id);
            }
        }
        Ok(())
    }

    /// Pending writes are already visible to this session
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let mut tables = self.store.tables.write();
        for pending in self.pending.values() {
            pending.check(&tables)?;
        }
        for (_, pending) in self.pending.drain() {
            pending.apply(&mut tables);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        self.pending.clear();
        Ok(())
    }
}

#[async_trait]
impl<E: Record> AsyncSession<E> for MemorySession {
    async fn insert(&mut self, entity: E) -> Result<E, StorageError> {
        tokio::task::yield_now().await;
        Session::<E>::insert(self, entity)
    }

    async fn get_by_id(&mut self, id: Uuid, visibility: Visibility) -> Result<Option<E>, StorageError> {
        tokio::task::yield_now().await;
        Session::<E>::get_by_id(self, id, visibility)
    }

    async fn query(&mut self, query: &Query) -> Result<Vec<E>, StorageError> {
        tokio::task::yield_now().await;
        Session::<E>::query(self, query)
    }

    async fn count(&mut self, predicate: &Predicate) -> Result<u64, StorageError> {
        tokio::task::yield_now().await;
        Session::<E>::count(self, predicate)
    }

    async fn update(&mut self, entity: E) -> Result<E, StorageError> {
        tokio::task::yield_now().await;
        Session::<E>::update(self, entity)
    }

    async fn delete(&mut self, entity: E, mode: DeleteMode) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        Session::<E>::delete(self, entity, mode)
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        Session::<E>::flush(self)
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        Session::<E>::commit(self)
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        Session::<E>::rollback(self)
    }
}
