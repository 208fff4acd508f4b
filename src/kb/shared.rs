use parking_lot::Mutex;
use tracing::{info, warn};

use crate::engine::{Engine, EngineError};

use super::KbPaths;

/// Where an isolated session engine came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSource {
    /// Cloned from the loaded shared instance (the cheap path)
    Cloned,
    /// Rebuilt from the published source files because no shared instance
    /// was available
    Rebuilt,
}

/// The long-lived shared engine instance.
///
/// Owns the published knowledge base behind a single lock. The triage
/// path only ever clones it; the publisher swaps in a freshly loaded
/// instance on reload. Rebuilding a session engine from the backing
/// files happens under the same lock, so a session can never read the
/// files mid-publish.
pub struct SharedEngine {
    paths: KbPaths,
    firing_limit: usize,
    engine: Mutex<Option<Engine>>,
}

impl SharedEngine {
    /// Create an unloaded shared engine; call [`SharedEngine::reload`] to
    /// load the published sources.
    pub fn new(paths: KbPaths, firing_limit: usize) -> Self {
        SharedEngine {
            paths,
            firing_limit,
            engine: Mutex::new(None),
        }
    }

    pub fn paths(&self) -> &KbPaths {
        &self.paths
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.lock().is_some()
    }

    /// Rule count of the loaded instance, zero when unloaded.
    pub fn rule_count(&self) -> usize {
        self.engine
            .lock()
            .as_ref()
            .map(Engine::rule_count)
            .unwrap_or(0)
    }

    /// Produce an isolated engine for one inference session.
    ///
    /// Prefers cloning the loaded shared instance. When none is loaded
    /// (startup load failed, or a reload never succeeded) the session
    /// engine is rebuilt from the published files — expensive, so it is
    /// reported as a fallback event.
    pub fn isolate(&self) -> Result<(Engine, EngineSource), EngineError> {
        let guard = self.engine.lock();
        if let Some(engine) = guard.as_ref() {
            return Ok((engine.clone(), EngineSource::Cloned));
        }

        warn!("shared engine unavailable; rebuilding session engine from published sources");
        let engine = self.build_from_files()?;
        Ok((engine, EngineSource::Rebuilt))
    }

    /// Reload the shared instance from the published files.
    ///
    /// The replacement is built before the old instance is dropped; on
    /// load failure the previous instance keeps serving (stale rules are
    /// preferable to no rules).
    pub fn reload(&self) -> Result<(), EngineError> {
        let mut guard = self.engine.lock();
        let fresh = self.build_from_files()?;
        info!(
            rules = fresh.rule_count(),
            templates = fresh.template_count(),
            "shared engine reloaded"
        );
        *guard = Some(fresh);
        Ok(())
    }

    fn build_from_files(&self) -> Result<Engine, EngineError> {
        let mut engine = Engine::with_firing_limit(self.firing_limit);
        let templates = self.paths.templates();
        if templates.is_file() {
            engine.load_file(&templates)?;
        }
        let live = self.paths.live();
        if live.is_file() {
            engine.load_file(&live)?;
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DEFAULT_FIRING_LIMIT;
    use std::fs;

    fn provisioned_paths() -> (tempfile::TempDir, KbPaths) {
        let tmp = tempfile::tempdir().unwrap();
        let paths = KbPaths::new(tmp.path());
        paths.ensure_provisioned().unwrap();
        (tmp, paths)
    }

    #[test]
    fn test_reload_then_clone() {
        let (_tmp, paths) = provisioned_paths();
        fs::write(
            paths.live(),
            r#"
(defrule Fever
  (patient-symptom (name fever))
  =>
  (assert (triage-result (level GREEN) (rationale "rest")))
)
"#,
        )
        .unwrap();

        let shared = SharedEngine::new(paths, DEFAULT_FIRING_LIMIT);
        assert!(!shared.is_loaded());

        shared.reload().unwrap();
        assert!(shared.is_loaded());
        assert_eq!(shared.rule_count(), 1);

        let (engine, source) = shared.isolate().unwrap();
        assert_eq!(source, EngineSource::Cloned);
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn test_isolate_falls_back_when_unloaded() {
        let (_tmp, paths) = provisioned_paths();
        let shared = SharedEngine::new(paths, DEFAULT_FIRING_LIMIT);

        let (engine, source) = shared.isolate().unwrap();
        assert_eq!(source, EngineSource::Rebuilt);
        // Templates exist even without a published rule source
        assert_eq!(engine.template_count(), 4);
        assert_eq!(engine.rule_count(), 0);
    }

    #[test]
    fn test_failed_reload_keeps_previous_instance() {
        let (_tmp, paths) = provisioned_paths();
        let shared = SharedEngine::new(paths.clone(), DEFAULT_FIRING_LIMIT);
        shared.reload().unwrap();

        fs::write(paths.live(), "(defrule broken").unwrap();
        assert!(shared.reload().is_err());

        // Still serving the last good load
        assert!(shared.is_loaded());
        let (_, source) = shared.isolate().unwrap();
        assert_eq!(source, EngineSource::Cloned);
    }

    #[test]
    fn test_missing_templates_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = KbPaths::new(tmp.path());
        fs::create_dir_all(paths.dir()).unwrap();

        let shared = SharedEngine::new(paths, DEFAULT_FIRING_LIMIT);
        shared.reload().unwrap();
        assert_eq!(shared.rule_count(), 0);
    }

    #[test]
    fn test_sessions_do_not_mutate_shared_instance() {
        let (_tmp, paths) = provisioned_paths();
        let shared = SharedEngine::new(paths, DEFAULT_FIRING_LIMIT);
        shared.reload().unwrap();

        let (mut engine, _) = shared.isolate().unwrap();
        engine.assert_fact("(patient-symptom (name fever))").unwrap();

        let (fresh, _) = shared.isolate().unwrap();
        assert_eq!(fresh.fact_count(), 0);
    }
}
