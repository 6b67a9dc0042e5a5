//! Domain layer - query building, pagination, validation and the repositories

pub mod clock;
pub mod filter;
pub mod pagination;
pub mod repository;
pub mod validation;

pub use clock::{Clock, MonotonicClock};
pub use filter::{build_predicate, Clause, FilterCondition, FilterSpec, Operand, Operator, Predicate};
pub use pagination::{
    apply_pagination, OrderBy, Page, PageLimits, PaginationSpec, Query, SortDirection, SortSpec,
};
pub use repository::{AsyncRepository, Repository, RepositoryCore, WriteOptions};
