//! Vector similarity domain
//!
//! - [`Embedder`]: text to vector, with a local [`HashingEmbedder`]
//! - [`VectorIndex`]: collection of embedded documents queried by similarity
//! - [`VectorLookup`]: hits, or the reason the index could not answer

mod embedding;
mod index;

pub use embedding::{Embedder, HashingEmbedder, cosine_similarity};
pub use index::{EmbeddingMetadata, EmbeddingRecord, VectorCandidate, VectorIndex, VectorLookup};
