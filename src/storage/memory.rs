// src/storage/memory.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::domain::rule::RuleDefinition;

use super::traits::{Storage, StoredRule, SymptomRecord};

/// In-memory storage backend.
///
/// The default backend for development and tests; a relational store can
/// be swapped in behind the same trait.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    symptoms: Mutex<Vec<SymptomRecord>>,
    rules: Mutex<BTreeMap<i64, StoredRule>>,
    next_rule_id: Mutex<i64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with the stock symptom catalog.
    pub fn with_seed_catalog() -> Self {
        let storage = Self::new();
        let mut symptoms = storage.symptoms.lock();
        for (name, synonyms) in SEED_SYMPTOMS {
            symptoms.push(SymptomRecord {
                name: name.to_string(),
                synonyms: synonyms.split(',').map(str::to_string).collect(),
            });
        }
        drop(symptoms);
        storage
    }
}

/// Stock symptom catalog with common synonyms.
const SEED_SYMPTOMS: &[(&str, &str)] = &[
    ("chest-pain", "chest pain,heart pain,cardiac pain,angina"),
    ("fever", "high temperature,pyrexia,hot,feverish"),
    ("headache", "head pain,migraine,cephalgia"),
    ("cough", "coughing,persistent cough,dry cough"),
    (
        "difficulty-breathing",
        "shortness of breath,dyspnea,breathless,cant breathe",
    ),
    ("abdominal-pain", "stomach pain,belly pain,tummy ache"),
    ("vomiting", "throwing up,nausea,emesis,sick"),
    ("diarrhea", "loose stool,runny stomach,gastroenteritis"),
    ("stiff-neck", "neck stiffness,rigid neck,nuchal rigidity"),
    ("confusion", "disoriented,altered mental state,confused"),
    ("severe-bleeding", "hemorrhage,blood loss,bleeding heavily"),
    ("unconscious", "passed out,fainted,unresponsive,collapsed"),
    ("seizure", "convulsions,fits,epileptic fit"),
    ("weakness", "fatigue,tiredness,lethargy"),
    ("dizziness", "vertigo,lightheaded,spinning"),
    ("rash", "skin rash,eruption,skin irritation"),
];

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_symptoms(&self) -> anyhow::Result<Vec<SymptomRecord>> {
        let mut symptoms = self.symptoms.lock().clone();
        symptoms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(symptoms)
    }

    async fn add_symptom(&self, name: &str, synonyms: Vec<String>) -> anyhow::Result<()> {
        if name.trim().is_empty() {
            anyhow::bail!("symptom name required");
        }

        let mut records = self.symptoms.lock();
        if let Some(existing) = records.iter_mut().find(|r| r.name == name) {
            for synonym in synonyms {
                if !existing.synonyms.contains(&synonym) {
                    existing.synonyms.push(synonym);
                }
            }
        } else {
            records.push(SymptomRecord {
                name: name.to_string(),
                synonyms,
            });
        }
        Ok(())
    }

    async fn resolve_symptom(&self, token: &str) -> anyhow::Result<Option<String>> {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return Ok(None);
        }

        let records = self.symptoms.lock();
        for record in records.iter() {
            if record.name.to_lowercase() == token {
                return Ok(Some(record.name.clone()));
            }
            if record
                .synonyms
                .iter()
                .any(|s| s.trim().to_lowercase() == token)
            {
                return Ok(Some(record.name.clone()));
            }
        }
        Ok(None)
    }

    async fn list_rules(&self) -> anyhow::Result<Vec<StoredRule>> {
        Ok(self.rules.lock().values().cloned().collect())
    }

    async fn add_rule(&self, rule: &RuleDefinition) -> anyhow::Result<i64> {
        let mut next_id = self.next_rule_id.lock();
        *next_id += 1;
        let id = *next_id;

        self.rules.lock().insert(
            id,
            StoredRule {
                id,
                name: rule.name.clone().unwrap_or_else(|| "unnamed".to_string()),
                rule: rule.clone(),
            },
        );
        Ok(id)
    }

    async fn update_rule(&self, id: i64, rule: &RuleDefinition) -> anyhow::Result<()> {
        let mut rules = self.rules.lock();
        let Some(stored) = rules.get_mut(&id) else {
            anyhow::bail!("no rule with id {id}");
        };
        if let Some(name) = &rule.name {
            stored.name = name.clone();
        }
        stored.rule = rule.clone();
        Ok(())
    }

    async fn delete_rule(&self, id: i64) -> anyhow::Result<()> {
        self.rules.lock().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::seed_rules;

    #[tokio::test]
    async fn test_symptom_resolution() {
        let storage = MemoryStorage::with_seed_catalog();

        // Exact name
        assert_eq!(
            storage.resolve_symptom("chest-pain").await.unwrap(),
            Some("chest-pain".to_string())
        );
        // Synonym, case-insensitive
        assert_eq!(
            storage.resolve_symptom("Heart Pain").await.unwrap(),
            Some("chest-pain".to_string())
        );
        // Unknown
        assert_eq!(storage.resolve_symptom("hiccups").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_symptom_merges_synonyms() {
        let storage = MemoryStorage::new();
        storage
            .add_symptom("fever", vec!["hot".to_string()])
            .await
            .unwrap();
        storage
            .add_symptom("fever", vec!["hot".to_string(), "pyrexia".to_string()])
            .await
            .unwrap();

        let symptoms = storage.list_symptoms().await.unwrap();
        assert_eq!(symptoms.len(), 1);
        assert_eq!(symptoms[0].synonyms, ["hot", "pyrexia"]);
    }

    #[tokio::test]
    async fn test_empty_symptom_name_rejected() {
        let storage = MemoryStorage::new();
        assert!(storage.add_symptom("  ", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_rule_crud() {
        let storage = MemoryStorage::new();
        let rules = seed_rules();

        let id = storage.add_rule(&rules[0]).await.unwrap();
        let second = storage.add_rule(&rules[1]).await.unwrap();
        assert_ne!(id, second);

        let listed = storage.list_rules().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Critical Cardiac Emergency");

        storage.update_rule(id, &rules[2]).await.unwrap();
        let listed = storage.list_rules().await.unwrap();
        assert_eq!(listed[0].name, "Unconscious Patient");

        storage.delete_rule(id).await.unwrap();
        assert_eq!(storage.list_rules().await.unwrap().len(), 1);

        assert!(storage.update_rule(999, &rules[0]).await.is_err());
    }
}
