use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Triage urgency level with severity ordering.
///
/// The three canonical levels come from the triage protocol; rule authors
/// are free to assert other level symbols, which survive round-trips as
/// `Other`. When comparing, a higher severity means a more urgent case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriageLevel {
    /// Non-urgent, self-care or routine visit
    Green,
    /// Urgent, needs evaluation within hours
    Yellow,
    /// Emergency, immediate transport and care
    Red,
    /// Author-defined level outside the canonical set
    Other(String),
}

impl TriageLevel {
    /// Parse a level token. Never fails: unknown tokens become `Other`,
    /// normalized to uppercase.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "GREEN" => TriageLevel::Green,
            "YELLOW" => TriageLevel::Yellow,
            "RED" => TriageLevel::Red,
            other => TriageLevel::Other(other.to_string()),
        }
    }

    /// String form as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            TriageLevel::Green => "GREEN",
            TriageLevel::Yellow => "YELLOW",
            TriageLevel::Red => "RED",
            TriageLevel::Other(s) => s,
        }
    }

    /// Severity rank; canonical levels order GREEN < YELLOW < RED,
    /// author-defined levels rank alongside GREEN.
    #[inline]
    pub fn severity(&self) -> u8 {
        match self {
            TriageLevel::Red => 2,
            TriageLevel::Yellow => 1,
            TriageLevel::Green | TriageLevel::Other(_) => 0,
        }
    }

    /// Returns true if this level requires emergency handling.
    #[inline]
    pub fn is_emergency(&self) -> bool {
        *self == TriageLevel::Red
    }
}

impl fmt::Display for TriageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TriageLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TriageLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(TriageLevel::parse(&s))
    }
}
