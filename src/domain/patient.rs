use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;

/// Errors rejecting a triage request body before any engine interaction.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("patient data must be a JSON object")]
    NotAnObject,

    #[error("invalid age value: {0}")]
    InvalidAge(String),
}

/// Parsed patient input for one triage request.
///
/// Triage requests arrive as free-form JSON; this struct is the single
/// place that free-form shape is disambiguated (key aliases, list vs
/// comma-delimited symptom strings). Every field is independently
/// optional and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientFacts {
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub history: Option<String>,
    pub mode_of_arrival: Option<String>,
    /// Raw symptom tokens, trimmed and lowercased, not yet resolved
    /// against the symptom catalog
    pub symptoms: SmallVec<[String; 8]>,
}

impl PatientFacts {
    /// Parse a request body. Fails only on a non-object body or an age
    /// value that cannot be read as an integer.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let map = value.as_object().ok_or(SchemaError::NotAnObject)?;

        let age = match map.get("age") {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_age(v)?),
        };

        let gender = non_empty_string(map.get("gender"));
        let history = non_empty_string(map.get("history"));

        // First present alias wins
        let mode_of_arrival = ["mode-of-arrival", "mode_of_arrival", "modeOfArrival"]
            .iter()
            .find_map(|key| non_empty_string(map.get(*key)));

        let raw_symptoms = map
            .get("symptoms")
            .or_else(|| map.get("symptom"))
            .or_else(|| map.get("symptoms_list"));

        let mut symptoms = SmallVec::new();
        match raw_symptoms {
            Some(Value::String(s)) => {
                for token in s.split(',') {
                    push_symptom(&mut symptoms, token);
                }
            }
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(s) = item {
                        push_symptom(&mut symptoms, s);
                    }
                }
            }
            _ => {}
        }

        Ok(PatientFacts {
            age,
            gender,
            history,
            mode_of_arrival,
            symptoms,
        })
    }

    /// True when a demographics fact should be asserted.
    pub fn has_demographics(&self) -> bool {
        self.age.is_some() || self.gender.is_some()
    }

    /// True when a history fact should be asserted.
    pub fn has_history(&self) -> bool {
        self.history.is_some() || self.mode_of_arrival.is_some()
    }
}

fn parse_age(value: &Value) -> Result<i64, SchemaError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| SchemaError::InvalidAge(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| SchemaError::InvalidAge(s.clone())),
        other => Err(SchemaError::InvalidAge(other.to_string())),
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn push_symptom(symptoms: &mut SmallVec<[String; 8]>, raw: &str) {
    let token = raw.trim().to_lowercase();
    if !token.is_empty() {
        symptoms.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            PatientFacts::from_value(&json!([1, 2])),
            Err(SchemaError::NotAnObject)
        ));
        assert!(matches!(
            PatientFacts::from_value(&json!("hello")),
            Err(SchemaError::NotAnObject)
        ));
    }

    #[test]
    fn test_full_parse() {
        let facts = PatientFacts::from_value(&json!({
            "age": 70,
            "gender": "male",
            "history": "diabetes",
            "mode-of-arrival": "walk in",
            "symptoms": ["Chest Pain", " fever "],
        }))
        .unwrap();

        assert_eq!(facts.age, Some(70));
        assert_eq!(facts.gender.as_deref(), Some("male"));
        assert_eq!(facts.history.as_deref(), Some("diabetes"));
        assert_eq!(facts.mode_of_arrival.as_deref(), Some("walk in"));
        assert_eq!(facts.symptoms.as_slice(), ["chest pain", "fever"]);
    }

    #[test]
    fn test_comma_delimited_symptoms() {
        let facts =
            PatientFacts::from_value(&json!({"symptoms": "fever, cough ,, headache"})).unwrap();
        assert_eq!(facts.symptoms.as_slice(), ["fever", "cough", "headache"]);
    }

    #[test]
    fn test_symptom_key_aliases() {
        let facts = PatientFacts::from_value(&json!({"symptom": "fever"})).unwrap();
        assert_eq!(facts.symptoms.as_slice(), ["fever"]);

        let facts = PatientFacts::from_value(&json!({"symptoms_list": ["cough"]})).unwrap();
        assert_eq!(facts.symptoms.as_slice(), ["cough"]);
    }

    #[test]
    fn test_mode_of_arrival_first_alias_wins() {
        let facts = PatientFacts::from_value(&json!({
            "mode_of_arrival": "ambulance",
            "modeOfArrival": "walked",
        }))
        .unwrap();
        assert_eq!(facts.mode_of_arrival.as_deref(), Some("ambulance"));
    }

    #[test]
    fn test_age_coercions() {
        assert_eq!(
            PatientFacts::from_value(&json!({"age": "42"})).unwrap().age,
            Some(42)
        );
        assert_eq!(
            PatientFacts::from_value(&json!({"age": 42.9})).unwrap().age,
            Some(42)
        );
        assert!(PatientFacts::from_value(&json!({"age": "old"})).is_err());
        assert!(PatientFacts::from_value(&json!({"age": true})).is_err());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let facts = PatientFacts::from_value(&json!({
            "age": 30,
            "blood_pressure": "120/80",
            "notes": ["irrelevant"],
        }))
        .unwrap();
        assert_eq!(facts.age, Some(30));
        assert!(facts.symptoms.is_empty());
        assert!(facts.has_demographics());
        assert!(!facts.has_history());
    }

    #[test]
    fn test_non_string_symptom_items_skipped() {
        let facts =
            PatientFacts::from_value(&json!({"symptoms": ["fever", 42, null]})).unwrap();
        assert_eq!(facts.symptoms.as_slice(), ["fever"]);
    }
}
