use serde::Serialize;

use crate::domain::level::TriageLevel;
use crate::domain::verdict::TriageVerdict;

/// Response from a triage run.
#[derive(Debug, Serialize)]
pub struct TriageResponse {
    /// Triage level, null when the verdict fact carried none
    pub triage_level: Option<TriageLevel>,

    /// Explanation of the verdict
    pub rationale: String,

    /// Recommended transport mode
    pub transport: String,

    /// Urgency score, omitted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl From<TriageVerdict> for TriageResponse {
    fn from(verdict: TriageVerdict) -> Self {
        TriageResponse {
            triage_level: verdict.level,
            rationale: verdict.rationale,
            transport: verdict.transport,
            score: verdict.score,
        }
    }
}

/// Response from a successful publish.
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub status: String,
    pub rules: usize,
    pub reloaded: bool,
}

/// Generic acknowledgement for authoring mutations.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl AckResponse {
    pub fn ok() -> Self {
        AckResponse {
            status: "ok".to_string(),
            id: None,
        }
    }

    pub fn with_id(id: i64) -> Self {
        AckResponse {
            status: "ok".to_string(),
            id: Some(id),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub rules: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }
}
