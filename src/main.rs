use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use triagr::api::routes::{create_router, AppState};
use triagr::config::Config;
use triagr::domain::rule::seed_rules;
use triagr::kb::{KbPaths, Publisher, SharedEngine};
use triagr::observability::{init_tracing, MetricsRegistry};
use triagr::storage::{MemoryStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting triagr dispatcher"
    );

    // Provision the knowledge-base directory and load the shared engine
    let paths = KbPaths::new(&config.kb_dir);
    paths.ensure_provisioned()?;

    let shared = Arc::new(SharedEngine::new(paths.clone(), config.firing_limit));
    if let Err(e) = shared.reload() {
        // Sessions fall back to rebuilding from files until a publish
        // succeeds
        warn!(error = %e, "failed to load published knowledge base at startup");
    }

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::with_seed_catalog());
    let publisher = Publisher::new(shared.clone());

    // Seed a fresh deployment so triage works out of the box
    if config.seed_on_empty && storage.list_rules().await?.is_empty() {
        for rule in seed_rules() {
            storage.add_rule(&rule).await?;
        }
        info!("seeded rule store with the stock triage rule set");

        if !paths.live().is_file() {
            match publisher.publish(&seed_rules()) {
                Ok(report) => info!(rules = report.rules, "published stock rule set"),
                Err(e) => warn!(error = %e, "failed to publish stock rule set"),
            }
        }
    }

    // Create application state
    let state = Arc::new(AppState {
        storage,
        shared,
        publisher,
        metrics: MetricsRegistry::new(),
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
