//! Projects parsed patient input into working-memory facts.
//!
//! At most one demographics fact and one history fact are asserted, and
//! one symptom fact per resolved token. Symptom tokens go through the
//! catalog's synonym lookup first; anything unresolved is normalized
//! locally and asserted best-effort, retrying as a quoted string when the
//! token cannot be written as a bare symbol.

use tracing::{debug, warn};

use crate::domain::patient::PatientFacts;
use crate::engine::{escape_string, is_valid_symbol, normalize_symbol, Engine, EngineError};
use crate::storage::Storage;

/// Assert all facts for one patient into an isolated session engine.
pub async fn assert_patient_facts(
    engine: &mut Engine,
    patient: &PatientFacts,
    storage: &dyn Storage,
) -> Result<(), EngineError> {
    if patient.has_demographics() {
        let mut slots = Vec::new();
        if let Some(age) = patient.age {
            slots.push(format!("(age {age})"));
        }
        if let Some(gender) = &patient.gender {
            slots.push(format!("(gender {})", symbol_or_quoted(gender)));
        }
        engine.assert_fact(&format!("(patient-demographics {})", slots.join(" ")))?;
    }

    if patient.has_history() {
        let mut slots = Vec::new();
        if let Some(history) = &patient.history {
            slots.push(format!("(history {})", normalize_symbol(history)));
        }
        if let Some(mode) = &patient.mode_of_arrival {
            slots.push(format!("(mode-of-arrival {})", symbol_or_quoted(mode)));
        }
        engine.assert_fact(&format!("(patient-history {})", slots.join(" ")))?;
    }

    for token in &patient.symptoms {
        let resolved = match storage.resolve_symptom(token).await {
            Ok(resolved) => resolved,
            Err(err) => {
                // Lookup trouble downgrades to local normalization
                warn!(token = %token, error = %err, "symptom lookup failed");
                None
            }
        };
        let name = normalize_symbol(resolved.as_deref().unwrap_or(token));
        assert_symptom(engine, &name);
    }

    Ok(())
}

/// Best-effort symptom assertion: bare symbol first, quoted string on
/// retry. Never propagates.
fn assert_symptom(engine: &mut Engine, name: &str) {
    if is_valid_symbol(name) {
        if engine
            .assert_fact(&format!("(patient-symptom (name {name}))"))
            .is_ok()
        {
            return;
        }
    }

    let quoted = format!("(patient-symptom (name \"{}\"))", escape_string(name));
    if let Err(err) = engine.assert_fact(&quoted) {
        debug!(symptom = %name, error = %err, "dropping unassertable symptom");
    }
}

fn symbol_or_quoted(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains(char::is_whitespace) || !is_valid_symbol(trimmed) {
        format!("\"{}\"", escape_string(trimmed))
    } else {
        trimmed.to_string()
    }
}
