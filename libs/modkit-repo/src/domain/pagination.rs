//! Pagination model - offset/limit windows over a deterministic order

use super::filter::Predicate;
use crate::contract::{Record, RepoError, ValidationErrors, ID_FIELD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Caller-chosen primary sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Requested window
///
/// A missing `limit` takes the configured default page size; any limit is
/// clamped to the configured maximum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSpec {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

impl PaginationSpec {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit: Some(limit),
            sort: None,
        }
    }

    /// First `limit` rows
    pub fn first(limit: u64) -> Self {
        Self::new(0, limit)
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            direction,
        });
        self
    }
}

/// Page size bounds taken from configuration; both are floored at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: SortDirection,
}

/// Engine-facing read request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub predicate: Predicate,
    pub order: Vec<OrderBy>,
    pub offset: u64,
    /// `None` reads every matching row
    pub limit: Option<u64>,
}

impl Query {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            ..Self::default()
        }
    }
}

/// Order and window `query`
///
/// The identifier ascending always closes the ordering, so repeated calls
/// over unchanged data return identical windows.
pub fn apply_pagination<E: Record>(
    mut query: Query,
    page: &PaginationSpec,
    limits: PageLimits,
) -> Result<Query, RepoError> {
    let max = limits.max_page_size.max(1);
    let limit = match page.limit {
        Some(0) => {
            return Err(ValidationErrors::single("limit", "must be greater than zero").into())
        }
        Some(limit) => limit.min(max),
        None => limits.default_page_size.clamp(1, max),
    };

    query.order.clear();
    if let Some(sort) = &page.sort {
        let def = E::field(&sort.field).ok_or_else(|| {
            RepoError::invalid_filter(&sort.field, format!("unknown sort field on {}", E::NAME))
        })?;
        query.order.push(OrderBy {
            field: def.name,
            direction: sort.direction,
        });
    }
    if query.order.iter().all(|o| o.field != ID_FIELD) {
        query.order.push(OrderBy {
            field: ID_FIELD,
            direction: SortDirection::Asc,
        });
    }

    query.offset = page.offset;
    query.limit = Some(limit);
    Ok(query)
}

/// One window of results plus the unwindowed total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total
    }

    /// Window right after this one, keeping the same size
    pub fn next_page(&self) -> Option<PaginationSpec> {
        self.has_next()
            .then(|| PaginationSpec::new(self.offset + self.limit, self.limit))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}
