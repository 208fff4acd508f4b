//! The production-rule engine.
//!
//! Loads fact templates and rules from the textual grammar, holds a
//! working memory of structured facts, and forward-chains to quiescence.
//! One `Engine` value is one isolated inference context; cloning is the
//! cheap way to get a private copy of the live knowledge base.

pub mod fact;
pub mod grammar;
mod runtime;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use grammar::{Construct, RuleDef, TemplateDef};

pub use fact::{escape_string, is_valid_symbol, normalize_symbol, Fact, SlotValue};

/// Default bound on rule firings per run.
pub const DEFAULT_FIRING_LIMIT: usize = 10_000;

/// Errors raised while loading sources or running inference.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("unknown template `{0}`")]
    UnknownTemplate(String),

    #[error("template `{template}` has no slot `{slot}`")]
    UnknownSlot { template: String, slot: String },

    #[error("duplicate template `{0}`")]
    DuplicateTemplate(String),

    #[error("malformed fact: {0}")]
    MalformedFact(String),

    #[error("firing limit of {0} exceeded; rule set may re-fire unboundedly")]
    FiringLimit(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Engine {
    templates: HashMap<String, TemplateDef>,
    rules: Vec<RuleDef>,
    wm: Vec<Fact>,
    /// Refraction memory: (rule index, matched fact ids) that already fired
    fired: HashSet<(usize, Vec<usize>)>,
    firing_limit: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine::with_firing_limit(DEFAULT_FIRING_LIMIT)
    }

    pub fn with_firing_limit(limit: usize) -> Self {
        Engine {
            templates: HashMap::new(),
            rules: Vec::new(),
            wm: Vec::new(),
            fired: HashSet::new(),
            firing_limit: limit,
        }
    }

    /// Load template and rule declarations from source text.
    ///
    /// Templates land first so rules may reference templates declared
    /// anywhere in the same text; every rule is checked against the known
    /// templates before it is installed, so a bad rule set fails here
    /// rather than at run time.
    pub fn load_str(&mut self, src: &str) -> Result<(), EngineError> {
        let constructs = grammar::parse_source(src)?;

        let mut new_rules = Vec::new();
        for construct in constructs {
            match construct {
                Construct::Template(template) => {
                    if self.templates.contains_key(&template.name) {
                        return Err(EngineError::DuplicateTemplate(template.name));
                    }
                    debug!(template = %template.name, "registered template");
                    self.templates.insert(template.name.clone(), template);
                }
                Construct::Rule(rule) => new_rules.push(rule),
            }
        }

        for rule in &new_rules {
            self.check_rule(rule)?;
        }
        self.rules.extend(new_rules);

        Ok(())
    }

    /// Load declarations from a file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let src = fs::read_to_string(path)?;
        self.load_str(&src)
    }

    /// Assert one fact from its textual form.
    ///
    /// Returns `Ok(false)` when an identical fact already exists (asserts
    /// have set semantics). The template and every slot must be declared.
    pub fn assert_fact(&mut self, text: &str) -> Result<bool, EngineError> {
        let fact = grammar::parse_fact(text)?;
        self.check_fact(&fact)?;

        if self.wm.contains(&fact) {
            return Ok(false);
        }
        self.wm.push(fact);
        Ok(true)
    }

    /// All facts currently in working memory, in assertion order.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.wm.iter()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn fact_count(&self) -> usize {
        self.wm.len()
    }

    /// Drop everything: templates, rules, facts, and refraction state.
    pub fn clear(&mut self) {
        self.templates.clear();
        self.rules.clear();
        self.wm.clear();
        self.fired.clear();
    }

    fn check_rule(&self, rule: &RuleDef) -> Result<(), EngineError> {
        for pattern in &rule.patterns {
            let template = self.lookup_template(&pattern.template)?;
            for (slot, _) in &pattern.constraints {
                check_slot(template, slot)?;
            }
        }
        for assert in &rule.asserts {
            let template = self.lookup_template(&assert.template)?;
            for (slot, _) in &assert.slots {
                check_slot(template, slot)?;
            }
        }
        Ok(())
    }

    fn check_fact(&self, fact: &Fact) -> Result<(), EngineError> {
        let template = self.lookup_template(fact.template())?;
        for (slot, _) in fact.slots() {
            check_slot(template, slot)?;
        }
        Ok(())
    }

    fn lookup_template(&self, name: &str) -> Result<&TemplateDef, EngineError> {
        self.templates
            .get(name)
            .ok_or_else(|| EngineError::UnknownTemplate(name.to_string()))
    }

    pub(crate) fn rules(&self) -> &[RuleDef] {
        &self.rules
    }

    pub(crate) fn wm(&self) -> &[Fact] {
        &self.wm
    }

    pub(crate) fn firing_limit(&self) -> usize {
        self.firing_limit
    }

    pub(crate) fn insert_fact(&mut self, fact: Fact) -> bool {
        if self.wm.contains(&fact) {
            return false;
        }
        self.wm.push(fact);
        true
    }

    pub(crate) fn mark_fired(&mut self, key: (usize, Vec<usize>)) {
        self.fired.insert(key);
    }

    pub(crate) fn has_fired(&self, key: &(usize, Vec<usize>)) -> bool {
        self.fired.contains(key)
    }
}

fn check_slot(template: &TemplateDef, slot: &str) -> Result<(), EngineError> {
    if template.slots.iter().any(|s| s == slot) {
        Ok(())
    } else {
        Err(EngineError::UnknownSlot {
            template: template.name.clone(),
            slot: slot.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATES: &str = r#"
(deftemplate patient-symptom (slot name))
(deftemplate triage-result (slot level) (slot score) (slot transport) (slot rationale))
"#;

    #[test]
    fn test_load_and_assert() {
        let mut engine = Engine::new();
        engine.load_str(TEMPLATES).unwrap();

        assert!(engine.assert_fact("(patient-symptom (name fever))").unwrap());
        // duplicate is a no-op
        assert!(!engine.assert_fact("(patient-symptom (name fever))").unwrap());
        assert_eq!(engine.fact_count(), 1);
    }

    #[test]
    fn test_assert_unknown_template_rejected() {
        let mut engine = Engine::new();
        engine.load_str(TEMPLATES).unwrap();

        let err = engine.assert_fact("(vital-signs (pulse 80))").unwrap_err();
        assert!(matches!(err, EngineError::UnknownTemplate(name) if name == "vital-signs"));
    }

    #[test]
    fn test_assert_unknown_slot_rejected() {
        let mut engine = Engine::new();
        engine.load_str(TEMPLATES).unwrap();

        let err = engine
            .assert_fact("(patient-symptom (severity 9))")
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownSlot { .. }));
    }

    #[test]
    fn test_rule_referencing_missing_template_fails_at_load() {
        let mut engine = Engine::new();
        engine.load_str(TEMPLATES).unwrap();

        let bad = r#"
(defrule Bad
  (vital-signs (pulse ?p))
  =>
  (assert (triage-result (level RED)))
)
"#;
        let err = engine.load_str(bad).unwrap_err();
        assert!(matches!(err, EngineError::UnknownTemplate(_)));
        // The failed load must not install the rule
        assert_eq!(engine.rule_count(), 0);
    }

    #[test]
    fn test_duplicate_template_rejected() {
        let mut engine = Engine::new();
        engine.load_str(TEMPLATES).unwrap();
        let err = engine
            .load_str("(deftemplate patient-symptom (slot name))")
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTemplate(_)));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut engine = Engine::new();
        engine.load_str(TEMPLATES).unwrap();
        engine.assert_fact("(patient-symptom (name fever))").unwrap();

        engine.clear();

        assert_eq!(engine.template_count(), 0);
        assert_eq!(engine.rule_count(), 0);
        assert_eq!(engine.fact_count(), 0);
    }

    #[test]
    fn test_clone_isolates_working_memory() {
        let mut engine = Engine::new();
        engine.load_str(TEMPLATES).unwrap();

        let mut clone = engine.clone();
        clone.assert_fact("(patient-symptom (name fever))").unwrap();

        assert_eq!(clone.fact_count(), 1);
        assert_eq!(engine.fact_count(), 0);
    }
}
