use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::level::TriageLevel;
use crate::domain::verdict::TriageVerdict;

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total triage requests that produced a verdict
    pub triage_total: AtomicU64,

    /// Verdicts by level
    pub triage_red: AtomicU64,
    pub triage_yellow: AtomicU64,
    pub triage_green: AtomicU64,
    pub triage_other: AtomicU64,

    /// Triage requests rejected before inference (schema errors)
    pub triage_rejected: AtomicU64,

    /// Inference runs that failed mid-execution
    pub inference_failures: AtomicU64,

    /// Sessions that had to rebuild their engine from files
    pub session_fallbacks: AtomicU64,

    /// Publish attempts
    pub publishes_total: AtomicU64,
    pub publish_failures: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a completed triage verdict.
    pub fn record_verdict(&self, verdict: &TriageVerdict) {
        self.triage_total.fetch_add(1, Ordering::Relaxed);

        match verdict.level {
            Some(TriageLevel::Red) => self.triage_red.fetch_add(1, Ordering::Relaxed),
            Some(TriageLevel::Yellow) => self.triage_yellow.fetch_add(1, Ordering::Relaxed),
            Some(TriageLevel::Green) => self.triage_green.fetch_add(1, Ordering::Relaxed),
            Some(TriageLevel::Other(_)) | None => {
                self.triage_other.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let lines = [
            ("triagr_triage_total", "counter", &self.triage_total),
            ("triagr_triage_red", "counter", &self.triage_red),
            ("triagr_triage_yellow", "counter", &self.triage_yellow),
            ("triagr_triage_green", "counter", &self.triage_green),
            ("triagr_triage_other", "counter", &self.triage_other),
            ("triagr_triage_rejected", "counter", &self.triage_rejected),
            (
                "triagr_inference_failures",
                "counter",
                &self.inference_failures,
            ),
            (
                "triagr_session_fallbacks",
                "counter",
                &self.session_fallbacks,
            ),
            ("triagr_publishes_total", "counter", &self.publishes_total),
            ("triagr_publish_failures", "counter", &self.publish_failures),
        ];

        let mut out = String::new();
        for (name, kind, value) in lines {
            out.push_str(&format!(
                "# TYPE {name} {kind}\n{name} {}\n",
                value.load(Ordering::Relaxed)
            ));
        }
        out
    }
}
