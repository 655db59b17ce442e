//! Knowledge graph infrastructure implementations
//!
//! Concrete implementations of the entity store trait using SQLite.

mod repository;

pub use repository::SqliteEntityStore;
