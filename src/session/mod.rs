//! Per-request inference sessions.
//!
//! Each triage request gets exactly one session holding its own isolated
//! engine instance; sessions are never shared or reused. The lifecycle is
//! `Created → FactsAsserted → Executed → Extracted → Closed`, and calling
//! a step out of order is an error rather than undefined behavior.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::patient::PatientFacts;
use crate::domain::verdict::TriageVerdict;
use crate::engine::{Engine, EngineError};
use crate::extractor;
use crate::kb::{EngineSource, SharedEngine};
use crate::projector;
use crate::storage::Storage;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    FactsAsserted,
    Executed,
    Extracted,
    Closed,
    /// A transition failed; only teardown is possible
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::FactsAsserted => "facts-asserted",
            SessionState::Executed => "executed",
            SessionState::Extracted => "extracted",
            SessionState::Closed => "closed",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Errors from one inference session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no engine available for session: {0}")]
    Unavailable(EngineError),

    #[error("failed to assert patient facts: {0}")]
    Assert(EngineError),

    #[error("inference failed: {0}")]
    Inference(EngineError),

    #[error("session is {actual}, cannot {operation}")]
    State {
        actual: SessionState,
        operation: &'static str,
    },
}

/// One isolated inference run against the published knowledge base.
pub struct InferenceSession {
    id: Uuid,
    engine: Engine,
    source: EngineSource,
    state: SessionState,
}

impl InferenceSession {
    /// Obtain an isolated engine and open a session on it.
    pub fn open(shared: &SharedEngine) -> Result<Self, SessionError> {
        let (engine, source) = shared.isolate().map_err(SessionError::Unavailable)?;
        let id = Uuid::new_v4();
        debug!(session = %id, ?source, rules = engine.rule_count(), "session opened");

        Ok(InferenceSession {
            id,
            engine,
            source,
            state: SessionState::Created,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the engine was cloned or rebuilt from files.
    pub fn engine_source(&self) -> EngineSource {
        self.source
    }

    /// Project patient facts into this session's engine only.
    pub async fn assert_facts(
        &mut self,
        patient: &PatientFacts,
        storage: &dyn Storage,
    ) -> Result<(), SessionError> {
        self.expect_state(SessionState::Created, "assert facts")?;

        if let Err(err) = projector::assert_patient_facts(&mut self.engine, patient, storage).await
        {
            self.state = SessionState::Error;
            return Err(SessionError::Assert(err));
        }

        self.state = SessionState::FactsAsserted;
        Ok(())
    }

    /// Run the engine to quiescence, returning the number of firings.
    pub fn execute(&mut self) -> Result<usize, SessionError> {
        self.expect_state(SessionState::FactsAsserted, "execute")?;

        let fired = match self.engine.run() {
            Ok(fired) => fired,
            Err(err) => {
                self.state = SessionState::Error;
                return Err(SessionError::Inference(err));
            }
        };

        info!(session = %self.id, fired, "inference completed");
        self.state = SessionState::Executed;
        Ok(fired)
    }

    /// Extract the normalized verdict from post-run working memory.
    pub fn extract(&mut self) -> Result<TriageVerdict, SessionError> {
        self.expect_state(SessionState::Executed, "extract")?;

        let verdict = extractor::extract_or_default(&self.engine);
        self.state = SessionState::Extracted;
        Ok(verdict)
    }

    /// Best-effort teardown; never fails, the instance is discarded
    /// regardless.
    pub fn close(mut self) {
        self.engine.clear();
        self.state = SessionState::Closed;
        debug!(session = %self.id, "session closed");
    }

    fn expect_state(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::State {
                actual: self.state,
                operation,
            })
        }
    }
}
