//! Domain layer
//!
//! Storage-agnostic types and the traits implemented by `infrastructure`.

pub mod knowledge;
pub mod vector;
