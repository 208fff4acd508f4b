pub mod level;
pub mod patient;
pub mod rule;
pub mod verdict;

pub use level::TriageLevel;
pub use patient::{PatientFacts, SchemaError};
pub use rule::{Action, Condition, ConditionField, RuleDefinition};
pub use verdict::TriageVerdict;
