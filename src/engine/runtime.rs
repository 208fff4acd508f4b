//! Forward-chaining execution.
//!
//! Conflict resolution: highest salience first; among equal salience,
//! declaration order, then matched-fact order. Refraction prevents a rule
//! from firing twice on the same fact combination, and asserted facts have
//! set semantics, so a run reaches quiescence; the firing limit bounds
//! pathological rule sets anyway.

use tracing::trace;

use super::fact::{Fact, SlotValue};
use super::grammar::{PatternDef, SlotConstraint};
use super::{Engine, EngineError};

impl Engine {
    /// Fire all matching rules until quiescence, returning the number of
    /// firings.
    pub fn run(&mut self) -> Result<usize, EngineError> {
        let limit = self.firing_limit();
        let mut fired_count = 0usize;

        while let Some((rule_idx, fact_ids)) = self.next_activation() {
            if fired_count >= limit {
                return Err(EngineError::FiringLimit(limit));
            }

            trace!(
                rule = %self.rules()[rule_idx].name,
                salience = self.rules()[rule_idx].salience,
                "firing rule"
            );

            self.mark_fired((rule_idx, fact_ids));
            let asserts = self.rules()[rule_idx].asserts.clone();
            for assert in asserts {
                self.insert_fact(Fact::new(assert.template, assert.slots));
            }
            fired_count += 1;
        }

        Ok(fired_count)
    }

    /// Best unfired activation under the conflict-resolution order.
    fn next_activation(&self) -> Option<(usize, Vec<usize>)> {
        let mut best: Option<(i64, usize, Vec<usize>)> = None;

        for (rule_idx, rule) in self.rules().iter().enumerate() {
            if let Some(better) = best.as_ref() {
                // A candidate from this rule can only win on salience now
                if rule.salience < better.0 {
                    continue;
                }
            }

            for fact_ids in self.rule_activations(rule) {
                if self.has_fired(&(rule_idx, fact_ids.clone())) {
                    continue;
                }
                let candidate = (rule.salience, rule_idx, fact_ids);
                let wins = match best.as_ref() {
                    None => true,
                    Some((salience, idx, ids)) => {
                        candidate.0 > *salience
                            || (candidate.0 == *salience
                                && (candidate.1, &candidate.2) < (*idx, ids))
                    }
                };
                if wins {
                    best = Some(candidate);
                }
            }
        }

        best.map(|(_, rule_idx, fact_ids)| (rule_idx, fact_ids))
    }

    /// All fact-id combinations activating the rule right now. Empty when
    /// a positive pattern has no match or a negated pattern has one. A
    /// rule with no positive patterns yields one empty combination.
    fn rule_activations(&self, rule: &super::grammar::RuleDef) -> Vec<Vec<usize>> {
        let mut per_pattern: Vec<Vec<usize>> = Vec::new();

        for pattern in &rule.patterns {
            let matches: Vec<usize> = self
                .wm()
                .iter()
                .enumerate()
                .filter(|(_, fact)| pattern_matches(pattern, fact))
                .map(|(id, _)| id)
                .collect();

            if pattern.negated {
                if !matches.is_empty() {
                    return Vec::new();
                }
            } else {
                if matches.is_empty() {
                    return Vec::new();
                }
                per_pattern.push(matches);
            }
        }

        cartesian(&per_pattern)
    }
}

fn pattern_matches(pattern: &PatternDef, fact: &Fact) -> bool {
    if pattern.template != fact.template() {
        return false;
    }

    pattern.constraints.iter().all(|(slot, constraint)| {
        let Some(value) = fact.slot(slot) else {
            return false;
        };
        match constraint {
            SlotConstraint::Bind => true,
            SlotConstraint::Symbol(s) => matches!(value, SlotValue::Symbol(v) if v == s),
            SlotConstraint::Str(s) => matches!(value, SlotValue::Str(v) if v == s),
            SlotConstraint::Int(n) => matches!(value, SlotValue::Int(v) if v == n),
            SlotConstraint::Guard { op, operand } => value
                .as_int()
                .is_some_and(|lhs| op.eval(lhs, *operand)),
        }
    })
}

fn cartesian(per_pattern: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut combos: Vec<Vec<usize>> = vec![Vec::new()];
    for ids in per_pattern {
        let mut next = Vec::with_capacity(combos.len() * ids.len());
        for combo in &combos {
            for id in ids {
                let mut extended = combo.clone();
                extended.push(*id);
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::super::Engine;
    use crate::engine::SlotValue;

    const KB: &str = r#"
(deftemplate patient-demographics (slot age) (slot gender))
(deftemplate patient-symptom (slot name))
(deftemplate triage-result (slot level) (slot score) (slot transport) (slot rationale))

(defrule Elderly_Chest_Pain
  (declare (salience 100))
  (patient-demographics (age ?age&:(> ?age 50)))
  (patient-symptom (name chest-pain))
  =>
  (assert (triage-result (level RED) (transport ambulance) (rationale "urgent")))
)

(defrule Any_Fever
  (declare (salience 30))
  (patient-symptom (name fever))
  =>
  (assert (triage-result (level GREEN) (transport none) (rationale "rest")))
)

(defrule Default_Triage
  (declare (salience 0))
  (not (triage-result))
  =>
  (assert (triage-result (level GREEN) (score 5) (transport none) (rationale "default")))
)
"#;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.load_str(KB).unwrap();
        engine
    }

    #[test]
    fn test_guarded_rule_fires() {
        let mut engine = engine();
        engine
            .assert_fact("(patient-demographics (age 70))")
            .unwrap();
        engine
            .assert_fact("(patient-symptom (name chest-pain))")
            .unwrap();

        let fired = engine.run().unwrap();
        assert_eq!(fired, 1);

        let verdict = engine
            .facts()
            .find(|f| f.template() == "triage-result")
            .unwrap();
        assert_eq!(
            verdict.slot("level"),
            Some(&SlotValue::Symbol("RED".to_string()))
        );
    }

    #[test]
    fn test_guard_rejects_below_threshold() {
        let mut engine = engine();
        engine
            .assert_fact("(patient-demographics (age 40))")
            .unwrap();
        engine
            .assert_fact("(patient-symptom (name chest-pain))")
            .unwrap();

        engine.run().unwrap();

        // Only the default rule fired
        let verdict = engine
            .facts()
            .find(|f| f.template() == "triage-result")
            .unwrap();
        assert_eq!(verdict.slot("score"), Some(&SlotValue::Int(5)));
    }

    #[test]
    fn test_default_suppressed_by_prior_verdict() {
        let mut engine = engine();
        engine.assert_fact("(patient-symptom (name fever))").unwrap();

        let fired = engine.run().unwrap();
        assert_eq!(fired, 1);

        let verdicts: Vec<_> = engine
            .facts()
            .filter(|f| f.template() == "triage-result")
            .collect();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(
            verdicts[0].slot("rationale"),
            Some(&SlotValue::Str("rest".to_string()))
        );
    }

    #[test]
    fn test_default_fires_when_nothing_matches() {
        let mut engine = engine();
        engine
            .assert_fact("(patient-symptom (name rash))")
            .unwrap();

        let fired = engine.run().unwrap();
        assert_eq!(fired, 1);
        let verdict = engine
            .facts()
            .find(|f| f.template() == "triage-result")
            .unwrap();
        assert_eq!(verdict.slot("score"), Some(&SlotValue::Int(5)));
    }

    #[test]
    fn test_salience_order_first_verdict_wins_position() {
        let mut engine = engine();
        engine
            .assert_fact("(patient-demographics (age 80))")
            .unwrap();
        engine
            .assert_fact("(patient-symptom (name chest-pain))")
            .unwrap();
        engine.assert_fact("(patient-symptom (name fever))").unwrap();

        // Both user rules activate; the salience-100 rule must fire first,
        // so the first verdict fact in assertion order is RED.
        let fired = engine.run().unwrap();
        assert_eq!(fired, 2);

        let first = engine
            .facts()
            .find(|f| f.template() == "triage-result")
            .unwrap();
        assert_eq!(
            first.slot("level"),
            Some(&SlotValue::Symbol("RED".to_string()))
        );
    }

    #[test]
    fn test_refraction_no_refire_on_rerun() {
        let mut engine = engine();
        engine.assert_fact("(patient-symptom (name fever))").unwrap();

        assert_eq!(engine.run().unwrap(), 1);
        assert_eq!(engine.run().unwrap(), 0);
    }

    #[test]
    fn test_firing_limit() {
        let mut engine = Engine::with_firing_limit(1);
        engine.load_str(KB).unwrap();
        engine
            .assert_fact("(patient-demographics (age 80))")
            .unwrap();
        engine
            .assert_fact("(patient-symptom (name chest-pain))")
            .unwrap();
        engine.assert_fact("(patient-symptom (name fever))").unwrap();

        let err = engine.run().unwrap_err();
        assert!(matches!(err, super::EngineError::FiringLimit(1)));
    }

    #[test]
    fn test_condition_free_rule_fires_once() {
        let mut engine = Engine::new();
        engine
            .load_str(
                r#"
(deftemplate triage-result (slot level) (slot score) (slot transport) (slot rationale))
(defrule Always
  (declare (salience 10))
  =>
  (assert (triage-result (level YELLOW) (rationale "unconditional")))
)
"#,
            )
            .unwrap();

        assert_eq!(engine.run().unwrap(), 1);
        assert_eq!(engine.run().unwrap(), 0);
    }
}
