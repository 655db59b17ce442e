//! Ontology catalog
//!
//! Listings of what the knowledge base holds, used to brief agents on the
//! full rule set rather than a query-specific slice of it.

use std::sync::Arc;

use crate::error::Result;

use super::entity::{EntityType, KnowledgeEntity};
use super::repository::EntityStore;

const RULES_HEADER: &str = "СПИСОК ПРАВИЛ INCOSE (из Онтологии):";
const NO_EXAMPLE: &str = "Нет примера";

/// Read-only listings over the entity store
pub struct OntologyCatalog<S: EntityStore + ?Sized> {
    store: Arc<S>,
}

impl<S: EntityStore + ?Sized> OntologyCatalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Rules ordered by their number (R1, R2, ..., R10)
    pub async fn rules(&self) -> Result<Vec<KnowledgeEntity>> {
        let mut rules = self.store.list_entities_by_type(EntityType::Rule).await?;
        rules.sort_by(|a, b| {
            a.identifier_number()
                .cmp(&b.identifier_number())
                .then_with(|| a.label.cmp(&b.label))
        });
        Ok(rules)
    }

    /// One line per rule with its example
    pub async fn rules_text(&self) -> Result<String> {
        let rules = self.rules().await?;

        let mut text = format!("{}\n", RULES_HEADER);
        for rule in &rules {
            let example = rule
                .example
                .as_deref()
                .filter(|e| !e.is_empty())
                .unwrap_or(NO_EXAMPLE);
            text.push_str(&format!("- {}. (Пример: {})\n", rule.label, example));
        }
        Ok(text)
    }

    /// Labels of concept entities, sorted alphabetically
    pub async fn concept_labels(&self) -> Result<Vec<String>> {
        let mut labels: Vec<String> = self
            .store
            .list_entities_by_type(EntityType::Concept)
            .await?
            .into_iter()
            .map(|e| e.label)
            .collect();
        labels.sort();
        labels.dedup();
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::knowledge::SqliteEntityStore;
    use crate::storage::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_catalog() -> (Arc<SqliteEntityStore>, OntologyCatalog<SqliteEntityStore>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let store = Arc::new(SqliteEntityStore::new(pool));
        (store.clone(), OntologyCatalog::new(store))
    }

    #[tokio::test]
    async fn test_rules_text_ordering_and_examples() {
        let (store, catalog) = setup_catalog().await;
        store
            .save_entity(&KnowledgeEntity::new("urn:R10", "R10").with_example("Десятый"))
            .await
            .unwrap();
        store
            .save_entity(&KnowledgeEntity::new("urn:R2", "R2"))
            .await
            .unwrap();
        store
            .save_entity(&KnowledgeEntity::new("urn:R1", "R1").with_example("Первый"))
            .await
            .unwrap();
        store
            .save_entity(&KnowledgeEntity::new("urn:C1", "C1"))
            .await
            .unwrap();

        let text = catalog.rules_text().await.unwrap();
        assert_eq!(
            text,
            "СПИСОК ПРАВИЛ INCOSE (из Онтологии):\n\
             - R1. (Пример: Первый)\n\
             - R2. (Пример: Нет примера)\n\
             - R10. (Пример: Десятый)\n"
        );
    }

    #[tokio::test]
    async fn test_rules_text_empty_store() {
        let (_store, catalog) = setup_catalog().await;
        assert_eq!(catalog.rules_text().await.unwrap(), format!("{}\n", RULES_HEADER));
    }

    #[tokio::test]
    async fn test_concept_labels_sorted() {
        let (store, catalog) = setup_catalog().await;
        for label in ["Требование", "Верификация", "R1"] {
            store
                .save_entity(&KnowledgeEntity::new(format!("urn:{label}"), label))
                .await
                .unwrap();
        }

        let labels = catalog.concept_labels().await.unwrap();
        assert_eq!(labels, vec!["Верификация", "Требование"]);
    }
}
