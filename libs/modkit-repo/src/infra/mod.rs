//! Storage engines

pub mod blocking;
pub mod memory;
pub mod storage;

pub use blocking::BlockingSession;
pub use memory::{MemorySession, MemoryStore};
pub use storage::{SeaOrmRecord, SeaOrmSession};
