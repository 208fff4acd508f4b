use std::path::PathBuf;

use clap::Parser;

use crate::engine::DEFAULT_FIRING_LIMIT;

/// Triage dispatcher configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "triagr")]
#[command(about = "Decision-support triage dispatcher")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:7000", env = "TRIAGR_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Knowledge-base directory (templates, live rules, staging, backup)
    #[arg(long, default_value = "knowledge_base", env = "TRIAGR_KB_DIR")]
    pub kb_dir: PathBuf,

    /// Bound on rule firings per inference run
    #[arg(long, default_value_t = DEFAULT_FIRING_LIMIT, env = "TRIAGR_FIRING_LIMIT")]
    pub firing_limit: usize,

    /// Seed the rule store and publish the stock rule set when the store
    /// is empty at startup
    #[arg(long, default_value = "true", env = "TRIAGR_SEED_ON_EMPTY")]
    pub seed_on_empty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "TRIAGR_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:7000".to_string(),
            kb_dir: PathBuf::from("knowledge_base"),
            firing_limit: DEFAULT_FIRING_LIMIT,
            seed_on_empty: true,
            log_level: "info".to_string(),
            graceful_shutdown: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.listen_addr, "0.0.0.0:7000");
        assert_eq!(config.kb_dir, PathBuf::from("knowledge_base"));
        assert_eq!(config.firing_limit, DEFAULT_FIRING_LIMIT);
        assert!(config.seed_on_empty);
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::parse_from([
            "triagr",
            "--listen-addr",
            "127.0.0.1:9000",
            "--firing-limit",
            "500",
        ]);

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.firing_limit, 500);
    }
}
