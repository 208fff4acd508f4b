pub mod publisher;
pub mod shared;

pub use publisher::{PublishError, PublishReport, Publisher};
pub use shared::{EngineSource, SharedEngine};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Fact template declarations every knowledge base starts from.
///
/// Written to `templates.clp` when missing so a fresh deployment can load
/// and validate rules without any manual provisioning.
pub const TEMPLATES_SRC: &str = r#";; Fact templates for the triage knowledge base.

(deftemplate patient-demographics
  (slot age)
  (slot gender))

(deftemplate patient-history
  (slot history)
  (slot mode-of-arrival))

(deftemplate patient-symptom
  (slot name))

(deftemplate triage-result
  (slot level)
  (slot score)
  (slot transport)
  (slot rationale))
"#;

/// File layout of one knowledge-base directory: the live rule source, an
/// ephemeral staging artifact, and a single-generation backup.
#[derive(Debug, Clone)]
pub struct KbPaths {
    dir: PathBuf,
}

impl KbPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        KbPaths { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Template declarations, loaded before any rule source.
    pub fn templates(&self) -> PathBuf {
        self.dir.join("templates.clp")
    }

    /// The live, published rule source.
    pub fn live(&self) -> PathBuf {
        self.dir.join("rules.clp")
    }

    /// Staging artifact, overwritten on every publish attempt.
    pub fn staging(&self) -> PathBuf {
        self.dir.join("rules.clp.staging")
    }

    /// Single backup generation, overwritten on every successful publish.
    pub fn backup(&self) -> PathBuf {
        self.dir.join("rules.clp.bak")
    }

    /// Create the directory and write the stock templates file if absent.
    pub fn ensure_provisioned(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        if !self.templates().is_file() {
            fs::write(self.templates(), TEMPLATES_SRC)?;
        }
        Ok(())
    }
}
