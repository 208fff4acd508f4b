use serde::Serialize;

use super::level::TriageLevel;

/// Rationale text asserted by the compiled default rule and returned when
/// working memory holds no verdict fact at all.
pub const DEFAULT_RATIONALE: &str =
    "Default non-urgent triage. No high-priority rules matched.";

/// Transport mode used when a verdict fact carries none.
pub const DEFAULT_TRANSPORT: &str = "none";

/// Score asserted by the compiled default rule.
pub const DEFAULT_SCORE: i64 = 5;

/// Normalized outcome of one inference run.
///
/// Every triage request produces one of these; the extractor guarantees
/// the fields are already normalized for API consumers (level uppercased,
/// rationale whitespace-collapsed, transport lowercased).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageVerdict {
    /// Triage level, or `None` when the verdict fact carried no level slot
    pub level: Option<TriageLevel>,

    /// Human-readable explanation of why the level was assigned
    pub rationale: String,

    /// Numeric urgency score, omitted when absent or non-numeric
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,

    /// Recommended transport mode, `"none"` when unspecified
    pub transport: String,
}

impl TriageVerdict {
    /// The fixed verdict returned when no rule produced a verdict fact.
    pub fn fallback() -> Self {
        TriageVerdict {
            level: Some(TriageLevel::Green),
            rationale: DEFAULT_RATIONALE.to_string(),
            score: Some(DEFAULT_SCORE),
            transport: DEFAULT_TRANSPORT.to_string(),
        }
    }
}
