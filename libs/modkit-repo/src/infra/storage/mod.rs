//! SeaORM storage engine
//!
//! An entity opts in by implementing [`SeaOrmRecord`], which names its SeaORM
//! entity and active model. [`SeaOrmSession`] then serves it inside one
//! database transaction per unit of work.

pub mod mapper;
pub mod migrations;
pub mod session;

pub use session::{select_by_id, SeaOrmRecord, SeaOrmSession};
