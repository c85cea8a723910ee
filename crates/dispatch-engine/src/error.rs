//! Error types for the dispatch engine binary.
//!
//! [`EngineError`] wraps every failure mode of engine startup and
//! shutdown so that `main` can propagate with `?`.

/// Top-level error for the dispatch engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: dispatch_core::config::ConfigError,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },

    /// The API server failed to start.
    #[error("startup error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: dispatch_server::startup::StartupError,
    },

    /// The API server stopped with an error.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: dispatch_server::ServerError,
    },

    /// The server task panicked or was aborted.
    #[error("server task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
