//! Infrastructure layer
//!
//! SQLite-backed implementations of the domain stores and the embedding
//! providers.

pub mod embedding;
pub mod knowledge;
pub mod vector;
