//! Server startup helper for embedding in the engine binary.
//!
//! Provides [`spawn_server`] which launches the HTTP + `WebSocket`
//! server on a background Tokio task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dispatch_server::startup::spawn_server;
//!
//! let handle = spawn_server(config.server.clone(), state, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })?;
//! handle.await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use dispatch_core::config::ServerConfig;
use tokio::task::JoinHandle;

use crate::server::{ServerError, socket_addr, start_server};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the dispatcher API server on a background Tokio task.
///
/// The task resolves when `shutdown` does and the server has drained.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address is not
/// parseable. This is detected before the background task is spawned.
pub fn spawn_server<F>(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<JoinHandle<Result<(), ServerError>>, StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = socket_addr(&config)?;

    let handle = tokio::spawn(async move {
        let result = start_server(&config, state, shutdown).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "dispatcher API exited with error");
        }
        result
    });

    tracing::info!(%addr, "dispatcher API spawned on background task");

    Ok(handle)
}
