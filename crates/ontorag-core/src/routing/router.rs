//! Keyword router
//!
//! Picks the agent for a question: anything mentioning standards or
//! requirements goes to the requirements expert, the rest to the architect.

use serde::Serialize;
use tracing::debug;

use crate::config::RoutingConfig;

/// Agent that should answer a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// General system-architecture assistant
    Architect,
    /// Requirements expert backed by the knowledge base
    Expert,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Expert => "expert",
        }
    }

    /// Whether this agent consults the knowledge base
    pub fn uses_knowledge_base(&self) -> bool {
        matches!(self, Self::Expert)
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Routes questions by case-insensitive keyword match
#[derive(Debug, Clone)]
pub struct QuestionRouter {
    /// Upper-cased keywords
    expert_keywords: Vec<String>,
}

impl Default for QuestionRouter {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

impl QuestionRouter {
    pub fn new<I, K>(keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let expert_keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_uppercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { expert_keywords }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(&config.expert_keywords)
    }

    pub fn keywords(&self) -> &[String] {
        &self.expert_keywords
    }

    /// The keyword that sent `input` to the expert, if any
    pub fn matched_keyword(&self, input: &str) -> Option<&str> {
        let upper = input.to_uppercase();
        self.expert_keywords
            .iter()
            .find(|k| upper.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn route(&self, input: &str) -> AgentRole {
        let role = match self.matched_keyword(input) {
            Some(_) => AgentRole::Expert,
            None => AgentRole::Architect,
        };
        debug!(role = %role, "Question routed");
        role
    }
}
