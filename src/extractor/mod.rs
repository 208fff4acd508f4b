//! Extracts and normalizes the verdict from a session's post-run working
//! memory.
//!
//! The verdict fact is identified structurally by template name, with a
//! textual-prefix match on the printed form as the fallback; each field
//! likewise prefers structured slot access and falls back to pattern
//! extraction over the printed representation. Triage always yields a
//! usable verdict: when no fact matches, the fixed default is returned.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::level::TriageLevel;
use crate::domain::verdict::{TriageVerdict, DEFAULT_TRANSPORT};
use crate::engine::{Engine, Fact, SlotValue};

const VERDICT_TEMPLATE: &str = "triage-result";

static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(level\s+([A-Za-z0-9_\-]+)\)").expect("level pattern"));
static RATIONALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(rationale\s+"((?:[^"\\]|\\.)*)"\)"#).expect("rationale pattern")
});
static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(score\s+([0-9]+)\)").expect("score pattern"));
static TRANSPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(transport\s+([A-Za-z0-9_\-]+)\)").expect("transport pattern"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Scan working memory for the first verdict fact and normalize it.
pub fn extract_verdict(engine: &Engine) -> Option<TriageVerdict> {
    engine
        .facts()
        .find(|fact| is_verdict_fact(fact))
        .map(normalize_fact)
}

/// Like [`extract_verdict`], but falls back to the fixed default verdict
/// so the caller always has something to return.
pub fn extract_or_default(engine: &Engine) -> TriageVerdict {
    extract_verdict(engine).unwrap_or_else(TriageVerdict::fallback)
}

fn is_verdict_fact(fact: &Fact) -> bool {
    fact.template() == VERDICT_TEMPLATE || fact.printed().starts_with("(triage-result")
}

fn normalize_fact(fact: &Fact) -> TriageVerdict {
    let printed = fact.printed();

    let level = fact
        .slot("level")
        .map(SlotValue::as_text)
        .or_else(|| capture(&LEVEL_RE, &printed))
        .map(|raw| TriageLevel::parse(&raw));

    let rationale = fact
        .slot("rationale")
        .map(SlotValue::as_text)
        .or_else(|| capture(&RATIONALE_RE, &printed))
        .map(|raw| WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned())
        .unwrap_or_default();

    let score = fact
        .slot("score")
        .and_then(SlotValue::as_int)
        .or_else(|| capture(&SCORE_RE, &printed).and_then(|s| s.parse().ok()));

    let transport = fact
        .slot("transport")
        .map(SlotValue::as_text)
        .or_else(|| capture(&TRANSPORT_RE, &printed))
        .map(|raw| raw.trim().to_lowercase())
        .unwrap_or_else(|| DEFAULT_TRANSPORT.to_string());

    TriageVerdict {
        level,
        rationale,
        score,
        transport,
    }
}

fn capture(re: &Regex, printed: &str) -> Option<String> {
    re.captures(printed)
        .map(|caps| caps[1].to_string())
}
