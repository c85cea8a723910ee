//! Dispatch engine binary.
//!
//! Wires together the entity store, event bus, routing oracle, triage
//! classifier, and orchestrator, then serves the dispatcher API until
//! `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `dispatch-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Create the event bus and entity store
//! 4. Seed the hospital network and fleet
//! 5. Build the routing oracle, orchestrator, and triage classifier
//! 6. Serve the API until `Ctrl-C`
//! 7. Abort running simulations

mod error;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use dispatch_core::config::{LogFormat, LoggingConfig};
use dispatch_core::retry::RetryPolicy;
use dispatch_core::scenario::{self, IncidentGenerator};
use dispatch_core::{DispatchConfig, EntityStore, Orchestrator, RoutingOracle, TriageClassifier};
use dispatch_events::EventBus;
use dispatch_server::AppState;
use dispatch_server::startup::spawn_server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_PATH: &str = "dispatch-config.yaml";

/// Application entry point for the dispatch engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the listener cannot
/// bind, or the server fails while serving.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config = DispatchConfig::load_or_default(Path::new(CONFIG_PATH))
        .map_err(EngineError::from)
        .with_context(|| format!("loading {CONFIG_PATH}"))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        host = config.server.host,
        port = config.server.port,
        routing = ?config.routing.backend,
        triage = ?config.triage.backend,
        time_scale = config.simulation.time_scale,
        "dispatch-engine starting"
    );

    // 3. Event bus and store.
    let bus = EventBus::new(config.broadcast.channel_capacity);
    let store = Arc::new(EntityStore::new(bus));

    // 4. Seed data.
    if config.seed.enabled {
        scenario::seed_store(&store).await;
    } else {
        warn!("seeding disabled, starting with an empty fleet");
    }

    // 5. Collaborators and orchestration.
    let oracle = Arc::new(RoutingOracle::from_config(
        &config.routing,
        RetryPolicy::from_config(&config.retry),
        config.dispatch.assumed_speed_kmh,
    ));
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&store), oracle, &config));
    let classifier = Arc::new(TriageClassifier::from_config(&config.triage));
    info!(
        oracle = orchestrator.oracle().name(),
        classifier = classifier.name(),
        "collaborators ready"
    );
    let state = Arc::new(AppState::new(
        Arc::clone(&orchestrator),
        classifier,
        IncidentGenerator::new(config.seed.random_seed),
        &config.broadcast,
    ));

    // 6. Serve until Ctrl-C.
    let handle = spawn_server(config.server.clone(), state, shutdown_signal())
        .map_err(EngineError::from)?;
    let served = handle.await.map_err(EngineError::from)?;

    // 7. Stop simulations regardless of how serving ended.
    orchestrator.shutdown();
    served.map_err(EngineError::from)?;

    info!(seq = store.bus().current_seq(), "dispatch-engine stopped");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence
/// over the configured level.
fn init_logging(config: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| EngineError::Logging {
            message: format!("invalid log level {:?}: {e}", config.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}

/// Resolves on `Ctrl-C`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
        return;
    }
    info!("Ctrl-C received, shutting down");
}
