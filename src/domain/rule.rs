use serde::{Deserialize, Serialize};

fn default_salience() -> i64 {
    10
}

/// A structured rule definition as authored through the API.
///
/// This is the JSON schema operators work with; the compiler translates a
/// list of these into the textual source the rule engine loads. Identity
/// is the name; firing priority is the salience (higher fires first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Rule name, unique within a published set. Compiled with spaces
    /// replaced by underscores; a positional name is generated if absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Firing priority, default 10
    #[serde(default = "default_salience")]
    pub salience: i64,

    /// Conditions, all of which must match for the rule to fire
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Actions contributing fields to the asserted verdict
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// One condition of a rule definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: String,
    pub value: serde_json::Value,
}

/// Patient attribute a condition tests. Unrecognized fields deserialize to
/// `Unknown` and compile to nothing, keeping the schema forward-tolerant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionField {
    Age,
    History,
    Symptom,
    #[serde(other)]
    Unknown,
}

/// One action of a rule definition.
///
/// Serialized in the externally-tagged form the authoring schema uses:
/// `{"set_triage_level": "RED"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SetTriageLevel(String),
    SetTransport(String),
    SetRationale(String),
}

impl RuleDefinition {
    /// Convenience constructor used by the seed set and tests.
    pub fn new(name: &str, salience: i64) -> Self {
        RuleDefinition {
            name: Some(name.to_string()),
            salience,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn condition(mut self, field: ConditionField, operator: &str, value: serde_json::Value) -> Self {
        self.conditions.push(Condition {
            field,
            operator: operator.to_string(),
            value,
        });
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// Starter rule set published when a deployment boots with an empty store.
///
/// Condensed from the protocol the system shipped with: cardiac and trauma
/// emergencies at the top, ambiguous presentations in the middle, benign
/// single-symptom cases at the bottom.
pub fn seed_rules() -> Vec<RuleDefinition> {
    use Action::*;
    use ConditionField::*;

    vec![
        RuleDefinition::new("Critical Cardiac Emergency", 100)
            .condition(Age, ">", 50.into())
            .condition(Symptom, "contains", "chest-pain".into())
            .action(SetTriageLevel("RED".into()))
            .action(SetTransport("ambulance".into()))
            .action(SetRationale(
                "Possible heart attack - immediate emergency transport required".into(),
            )),
        RuleDefinition::new("Trauma Emergency", 100)
            .condition(Symptom, "contains", "severe-bleeding".into())
            .action(SetTriageLevel("RED".into()))
            .action(SetTransport("ambulance".into()))
            .action(SetRationale(
                "Severe trauma with bleeding - immediate ambulance required".into(),
            )),
        RuleDefinition::new("Unconscious Patient", 100)
            .condition(Symptom, "contains", "unconscious".into())
            .action(SetTriageLevel("RED".into()))
            .action(SetTransport("ambulance".into()))
            .action(SetRationale(
                "Unconscious patient - immediate emergency care required".into(),
            )),
        RuleDefinition::new("Meningitis Concern", 95)
            .condition(Symptom, "contains", "fever".into())
            .condition(Symptom, "contains", "stiff-neck".into())
            .condition(Symptom, "contains", "headache".into())
            .action(SetTriageLevel("RED".into()))
            .action(SetTransport("ambulance".into()))
            .action(SetRationale(
                "Suspected meningitis - urgent hospital evaluation required".into(),
            )),
        RuleDefinition::new("Severe Respiratory Distress", 90)
            .condition(Symptom, "contains", "difficulty-breathing".into())
            .action(SetTriageLevel("RED".into()))
            .action(SetTransport("ambulance".into()))
            .action(SetRationale(
                "Severe respiratory distress - oxygen support needed immediately".into(),
            )),
        RuleDefinition::new("Acute Abdomen", 70)
            .condition(Symptom, "contains", "abdominal-pain".into())
            .condition(Symptom, "contains", "vomiting".into())
            .action(SetTriageLevel("YELLOW".into()))
            .action(SetTransport("matatu".into()))
            .action(SetRationale(
                "Acute abdominal condition - hospital evaluation needed within hours".into(),
            )),
        RuleDefinition::new("Diabetic With Fever", 65)
            .condition(History, "=", "diabetes".into())
            .condition(Symptom, "contains", "fever".into())
            .action(SetTriageLevel("YELLOW".into()))
            .action(SetTransport("matatu".into()))
            .action(SetRationale(
                "Diabetic with infection risk - hospital visit recommended".into(),
            )),
        RuleDefinition::new("Severe Flu", 60)
            .condition(Symptom, "contains", "fever".into())
            .condition(Symptom, "contains", "cough".into())
            .condition(Symptom, "contains", "headache".into())
            .action(SetTriageLevel("YELLOW".into()))
            .action(SetTransport("matatu".into()))
            .action(SetRationale(
                "Flu-like symptoms - medical consultation recommended today".into(),
            )),
        RuleDefinition::new("Simple Fever", 25)
            .condition(Symptom, "contains", "fever".into())
            .action(SetTriageLevel("GREEN".into()))
            .action(SetTransport("self-care".into()))
            .action(SetRationale(
                "Mild fever - rest and fluids recommended, visit chemist for medication".into(),
            )),
        RuleDefinition::new("Mild Headache", 20)
            .condition(Symptom, "contains", "headache".into())
            .action(SetTriageLevel("GREEN".into()))
            .action(SetTransport("self-care".into()))
            .action(SetRationale(
                "Mild headache - over-the-counter medication recommended".into(),
            )),
    ]
}
