use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::compiler::compile_rules;
use crate::domain::rule::RuleDefinition;
use crate::engine::Engine;

use super::shared::SharedEngine;

/// Errors from a publish attempt.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("no rules to publish")]
    EmptyRuleSet,

    #[error("validation failed: {details}")]
    Validation { details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, Copy)]
pub struct PublishReport {
    /// Number of user rules compiled (the default rule is extra)
    pub rules: usize,
    /// Whether the shared engine picked up the new source; `false` means
    /// it keeps serving the previous rule set until the next publish
    pub reloaded: bool,
}

/// Validates and atomically publishes compiled rule sets into the live
/// knowledge base.
pub struct Publisher {
    shared: Arc<SharedEngine>,
    /// Serializes publish attempts; two interleaved publishes must not
    /// promote each other's staging content
    gate: Mutex<()>,
}

impl Publisher {
    pub fn new(shared: Arc<SharedEngine>) -> Self {
        Publisher {
            shared,
            gate: Mutex::new(()),
        }
    }

    /// Compile, validate, and publish a rule set.
    ///
    /// The staged text is loaded into a throwaway engine before anything
    /// touches the live source; a staged set that fails to load leaves
    /// the knowledge base byte-for-byte unchanged. Promotion is
    /// copy-backup then rename-staging-over-live, so a crash between the
    /// two steps leaves a loadable live source plus a backup rather than
    /// a torn file.
    pub fn publish(&self, rules: &[RuleDefinition]) -> Result<PublishReport, PublishError> {
        if rules.is_empty() {
            return Err(PublishError::EmptyRuleSet);
        }

        let _publishing = self.gate.lock();
        let paths = self.shared.paths();
        let compiled = format!(";; Generated by rule publish\n{}", compile_rules(rules));

        fs::write(paths.staging(), &compiled)?;

        // Validate against a throwaway engine: templates first, then the
        // staged rule text, exactly as the live engine would load them.
        let mut probe = Engine::new();
        let validation = if paths.templates().is_file() {
            probe.load_file(&paths.templates())
        } else {
            Ok(())
        }
        .and_then(|()| probe.load_str(&compiled));
        if let Err(err) = validation {
            warn!(error = %err, "staged rule set failed validation; live source untouched");
            return Err(PublishError::Validation {
                details: err.to_string(),
            });
        }

        // Promote: single-generation backup, then atomic rename.
        if paths.live().is_file() {
            fs::copy(paths.live(), paths.backup())?;
        }
        fs::rename(paths.staging(), paths.live())?;

        info!(rules = rules.len(), "published rule set");

        let reloaded = match self.shared.reload() {
            Ok(()) => true,
            Err(err) => {
                // Non-fatal: the files are published; the shared engine
                // keeps serving the previous rules until the next publish.
                warn!(error = %err, "failed to reload shared engine after publish");
                false
            }
        };

        Ok(PublishReport {
            rules: rules.len(),
            reloaded,
        })
    }
}
