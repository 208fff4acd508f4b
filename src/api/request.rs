use serde::Deserialize;

use crate::domain::rule::RuleDefinition;

/// Body for registering a catalog symptom.
#[derive(Debug, Deserialize)]
pub struct AddSymptomRequest {
    pub name: String,
    #[serde(default)]
    pub synonyms: SynonymInput,
}

/// Synonyms arrive either as a list or as one comma-delimited string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SynonymInput {
    List(Vec<String>),
    Csv(String),
}

impl Default for SynonymInput {
    fn default() -> Self {
        SynonymInput::List(Vec::new())
    }
}

impl SynonymInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            SynonymInput::List(items) => items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            SynonymInput::Csv(csv) => csv
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Body for updating a stored rule.
#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    pub id: i64,
    pub rule: RuleDefinition,
}

/// Body for deleting a stored rule.
#[derive(Debug, Deserialize)]
pub struct DeleteRuleRequest {
    pub id: i64,
}
