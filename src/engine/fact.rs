use std::fmt;

/// A single slot value in the engine's fact language.
///
/// Symbols are unquoted atomic tokens; strings are quoted and may contain
/// arbitrary characters; integers are kept numeric so guard predicates can
/// compare them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotValue {
    Symbol(String),
    Str(String),
    Int(i64),
}

impl SlotValue {
    /// Numeric view of the value, parsing symbol/string content when it
    /// happens to be an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SlotValue::Int(n) => Some(*n),
            SlotValue::Symbol(s) | SlotValue::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Textual content without quoting.
    pub fn as_text(&self) -> String {
        match self {
            SlotValue::Symbol(s) | SlotValue::Str(s) => s.clone(),
            SlotValue::Int(n) => n.to_string(),
        }
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotValue::Symbol(s) => f.write_str(s),
            SlotValue::Str(s) => write!(f, "\"{}\"", escape_string(s)),
            SlotValue::Int(n) => write!(f, "{n}"),
        }
    }
}

/// A structured fact in working memory.
///
/// Exposes both a structured slot accessor and the canonical printed form,
/// so callers that cannot rely on slot introspection have an explicit
/// textual path to fall back on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fact {
    template: String,
    slots: Vec<(String, SlotValue)>,
}

impl Fact {
    pub fn new(template: impl Into<String>, slots: Vec<(String, SlotValue)>) -> Self {
        Fact {
            template: template.into(),
            slots,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Structured slot access by name.
    pub fn slot(&self, name: &str) -> Option<&SlotValue> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, value)| value)
    }

    pub fn slots(&self) -> &[(String, SlotValue)] {
        &self.slots
    }

    /// Canonical printed representation, e.g.
    /// `(triage-result (level RED) (rationale "urgent"))`.
    pub fn printed(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.template)?;
        for (name, value) in &self.slots {
            write!(f, " ({name} {value})")?;
        }
        f.write_str(")")
    }
}

/// Normalize free text to symbol form: trim, lowercase, and collapse each
/// internal whitespace run to a single hyphen. Idempotent.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// True when the token can be written as a bare symbol without breaking
/// the grammar: no delimiters, quotes, comment markers, or variable prefix.
pub fn is_valid_symbol(token: &str) -> bool {
    !token.is_empty()
        && !token.starts_with('?')
        && !token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '&' | '\\'))
}

/// Escape a string for embedding between double quotes in rule source.
pub fn escape_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
