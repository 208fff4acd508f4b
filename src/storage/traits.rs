// src/storage/traits.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::rule::RuleDefinition;

/// A catalog symptom with its registered synonyms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomRecord {
    /// Canonical symbol name, e.g. `chest-pain`
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// A stored rule definition with its storage identity.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRule {
    pub id: i64,
    pub name: String,
    pub rule: RuleDefinition,
}

/// Storage trait for the symptom catalog and the authored rule set.
///
/// The serving process treats persistence as an external collaborator;
/// triage requests only ever read from it (synonym resolution), so
/// implementations must be safe for concurrent reads.
#[async_trait]
pub trait Storage: Send + Sync {
    // Symptom catalog
    async fn list_symptoms(&self) -> anyhow::Result<Vec<SymptomRecord>>;
    /// Insert a symptom, merging synonyms when the name already exists.
    async fn add_symptom(&self, name: &str, synonyms: Vec<String>) -> anyhow::Result<()>;
    /// Resolve a token to its canonical symptom name by exact name or
    /// registered synonym, case-insensitively.
    async fn resolve_symptom(&self, token: &str) -> anyhow::Result<Option<String>>;

    // Authored rules
    async fn list_rules(&self) -> anyhow::Result<Vec<StoredRule>>;
    async fn add_rule(&self, rule: &RuleDefinition) -> anyhow::Result<i64>;
    async fn update_rule(&self, id: i64, rule: &RuleDefinition) -> anyhow::Result<()>;
    async fn delete_rule(&self, id: i64) -> anyhow::Result<()>;
}
