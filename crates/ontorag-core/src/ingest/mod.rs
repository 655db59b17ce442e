//! Ontology ingestion
//!
//! - `ontology`: Turtle parsing into an indexed triple list
//! - `pipeline`: loading entities, embeddings and support edges

mod ontology;
mod pipeline;

pub use ontology::{ObjectValue, OntologyGraph, OntologyTriple};
pub use pipeline::{IngestReport, IngestionPipeline, OntologyVocabulary};
