//! Translates structured rule definitions into the textual grammar the
//! rule engine loads.
//!
//! Compilation is total and deterministic: identical input yields
//! byte-identical output, unsupported condition combinations are dropped
//! rather than rejected, and a fixed lowest-priority default rule is
//! appended on every compile so an inference run always produces a
//! verdict fact.

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::rule::{Action, Condition, ConditionField, RuleDefinition};
use crate::domain::verdict::{DEFAULT_RATIONALE, DEFAULT_SCORE, DEFAULT_TRANSPORT};
use crate::engine::{escape_string, is_valid_symbol, normalize_symbol};

/// Name of the compiler-owned default rule. Not user-removable.
pub const DEFAULT_RULE_NAME: &str = "R0_Default_Triage";

/// Compile an ordered rule list into engine source text.
pub fn compile_rules(rules: &[RuleDefinition]) -> String {
    let mut pieces: Vec<String> = rules
        .iter()
        .enumerate()
        .map(|(idx, rule)| compile_rule(idx, rule))
        .collect();

    pieces.push(default_rule());
    pieces.join("\n\n") + "\n"
}

fn compile_rule(idx: usize, rule: &RuleDefinition) -> String {
    let display_name = rule.name.clone().unwrap_or_else(|| format!("R_user_{idx}"));
    let rule_name = display_name.replace(' ', "_");

    let lhs: Vec<String> = rule
        .conditions
        .iter()
        .filter_map(|cond| {
            let compiled = compile_condition(cond);
            if compiled.is_none() {
                debug!(
                    rule = %display_name,
                    field = ?cond.field,
                    operator = %cond.operator,
                    "dropping unsupported condition"
                );
            }
            compiled
        })
        .collect();

    if lhs.is_empty() && !rule.conditions.is_empty() {
        warn!(
            rule = %display_name,
            "all conditions unsupported; rule compiles condition-free and will always fire"
        );
    }

    let mut level = None;
    let mut transport = None;
    let mut rationale = None;
    for action in &rule.actions {
        match action {
            Action::SetTriageLevel(value) => level = Some(value),
            Action::SetTransport(value) => transport = Some(value),
            // Last rationale wins
            Action::SetRationale(value) => rationale = Some(value),
        }
    }

    let mut lines = Vec::new();
    lines.push(format!("(defrule {rule_name}"));
    lines.push(format!("  \"{}\"", escape_string(&display_name)));
    lines.push(format!("  (declare (salience {}))", rule.salience));
    for pattern in &lhs {
        lines.push(format!("  {pattern}"));
    }
    lines.push("  =>".to_string());
    lines.push("  (assert (triage-result".to_string());
    if let Some(value) = level {
        lines.push(format!("    (level {})", symbol_or_quoted(value)));
    }
    if let Some(value) = transport {
        lines.push(format!("    (transport {})", symbol_or_quoted(value)));
    }
    if let Some(value) = rationale {
        lines.push(format!("    (rationale \"{}\")", escape_string(value)));
    }
    lines.push("  ))".to_string());
    lines.push(")".to_string());

    lines.join("\n")
}

/// Translate one condition, or `None` when the (field, operator)
/// combination is outside the supported table.
fn compile_condition(cond: &Condition) -> Option<String> {
    match cond.field {
        ConditionField::Age => {
            let op = match cond.operator.as_str() {
                op @ (">" | "<" | ">=" | "<=" | "=" | "!=") => op,
                _ => return None,
            };
            let value = coerce_int(&cond.value)?;
            Some(format!(
                "(patient-demographics (age ?age&:({op} ?age {value})))"
            ))
        }
        ConditionField::History => match cond.operator.as_str() {
            "=" | "contains" => Some(format!(
                "(patient-history (history {}))",
                symbol_or_quoted(&value_text(&cond.value))
            )),
            _ => None,
        },
        ConditionField::Symptom => match cond.operator.as_str() {
            "contains" | "=" | "in" => Some(format!(
                "(patient-symptom (name {}))",
                symbol_or_quoted(&value_text(&cond.value))
            )),
            _ => None,
        },
        ConditionField::Unknown => None,
    }
}

fn default_rule() -> String {
    format!(
        r#"(defrule {DEFAULT_RULE_NAME}
  "Safe default: non-urgent GREEN when no other triage-result asserted."
  (declare (salience 0))
  (not (triage-result))
  =>
  (assert (triage-result
    (level GREEN)
    (score {DEFAULT_SCORE})
    (transport {DEFAULT_TRANSPORT})
    (rationale "{DEFAULT_RATIONALE}")
  ))
)"#
    )
}

/// Emit a value as a bare symbol when safe, otherwise as a quoted string.
fn symbol_or_quoted(raw: &str) -> String {
    let symbol = normalize_symbol(raw);
    if is_valid_symbol(&symbol) {
        symbol
    } else {
        format!("\"{}\"", escape_string(raw))
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
