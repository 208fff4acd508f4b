pub mod api;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod engine;
pub mod extractor;
pub mod kb;
pub mod observability;
pub mod projector;
pub mod session;
pub mod storage;

pub use config::Config;
pub use domain::{PatientFacts, RuleDefinition, TriageLevel, TriageVerdict};
pub use engine::Engine;
pub use kb::{KbPaths, Publisher, SharedEngine};
pub use session::InferenceSession;
