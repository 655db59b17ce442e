//! Question routing between the architect and expert agents

mod router;

pub use router::{AgentRole, QuestionRouter};
