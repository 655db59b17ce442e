//! In-memory view of a parsed Turtle document
//!
//! Keeps the distinct triples in document order and an index from
//! (subject, predicate) to objects for attribute lookups.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use oxrdf::vocab::rdfs;
use oxrdf::{Subject, Term, Triple};
use oxttl::TurtleParser;
use tracing::debug;

use crate::error::{Error, Result};

/// Object position of a triple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectValue {
    Iri(String),
    Literal(String),
    Blank,
}

impl ObjectValue {
    /// Text of a literal, or the IRI itself
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            Self::Literal(value) => Some(value),
            Self::Blank => None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }
}

/// A triple with an IRI predicate; blank-node subjects are kept as `None`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OntologyTriple {
    pub subject: Option<String>,
    pub predicate: String,
    pub object: ObjectValue,
}

/// Parsed ontology graph
#[derive(Debug, Default)]
pub struct OntologyGraph {
    triples: Vec<OntologyTriple>,
    objects: HashMap<(String, String), Vec<ObjectValue>>,
}

impl OntologyGraph {
    /// Parse a Turtle file
    pub fn parse_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::OntologySourceNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        Self::parse_bytes(&bytes)
    }

    /// Parse Turtle text
    pub fn parse_str(turtle: &str) -> Result<Self> {
        Self::parse_bytes(turtle.as_bytes())
    }

    fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let mut graph = Self::default();
        let mut seen = HashSet::new();

        for triple in TurtleParser::new().for_slice(bytes) {
            let triple = triple.map_err(|e| Error::OntologyParse(e.to_string()))?;
            let triple = convert(triple);
            if seen.insert(triple.clone()) {
                graph.push(triple);
            }
        }

        debug!(triples = graph.len(), "Ontology parsed");
        Ok(graph)
    }

    fn push(&mut self, triple: OntologyTriple) {
        if let Some(subject) = &triple.subject {
            self.objects
                .entry((subject.clone(), triple.predicate.clone()))
                .or_default()
                .push(triple.object.clone());
        }
        self.triples.push(triple);
    }

    /// Distinct triples in document order
    pub fn triples(&self) -> &[OntologyTriple] {
        &self.triples
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// First object text for (subject, predicate), in document order
    pub fn first_value(&self, subject: &str, predicate: &str) -> Option<&str> {
        self.objects
            .get(&(subject.to_string(), predicate.to_string()))
            .and_then(|values| values.iter().find_map(ObjectValue::as_text))
    }

    /// `rdfs:label` of a resource, if non-empty
    pub fn label(&self, subject: &str) -> Option<&str> {
        self.first_value(subject, rdfs::LABEL.as_str())
            .filter(|l| !l.trim().is_empty())
    }

    /// `rdfs:comment` of a resource
    pub fn comment(&self, subject: &str) -> Option<&str> {
        self.first_value(subject, rdfs::COMMENT.as_str())
    }
}

fn convert(triple: Triple) -> OntologyTriple {
    let subject = match triple.subject {
        Subject::NamedNode(node) => Some(node.into_string()),
        _ => None,
    };
    let object = match triple.object {
        Term::NamedNode(node) => ObjectValue::Iri(node.into_string()),
        Term::Literal(literal) => ObjectValue::Literal(literal.value().to_string()),
        _ => ObjectValue::Blank,
    };

    OntologyTriple {
        subject,
        predicate: triple.predicate.into_string(),
        object,
    }
}
