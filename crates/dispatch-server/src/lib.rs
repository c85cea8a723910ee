//! Dispatcher API server for the dispatch engine.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/dispatch`) streaming every state
//!   change in sequence order, starting from a consistent snapshot
//! - **REST endpoints** for incidents, ambulances, hospitals, hazards,
//!   routing, and triage
//! - **Dispatch endpoints** for automatic dispatch, candidate ranking,
//!   and simulation control
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Handlers are thin: they validate input, call the
//! [`Orchestrator`](dispatch_core::Orchestrator) or the entity store,
//! and wrap the result in [`ApiResponse`](dispatch_types::ApiResponse).
//! Domain errors become HTTP statuses in [`error::ApiError`]. Dispatcher
//! sessions never block the store: each reads from its own broadcast
//! receiver and resynchronises from a snapshot if it falls behind.

pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fleet;
pub mod handlers;
pub mod incidents;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::{AppState, SessionRegistry};
