//! Vector index infrastructure implementations

mod repository;

pub use repository::SqliteVectorIndex;
