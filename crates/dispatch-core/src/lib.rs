//! Dispatch engine core: entity store, ranking, orchestration, and
//! movement simulation.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `dispatch-config.yaml` into
//!   strongly-typed structs.
//! - [`error`] -- [`DispatchError`], the domain error taxonomy.
//! - [`geo`] -- Great-circle distance, bearings, interpolation, and
//!   polyline walking.
//! - [`store`] -- [`EntityStore`], the single source of truth for
//!   incidents, ambulances, hospitals, and hazards. Every mutation is
//!   validated and published as one event.
//! - [`routing`] -- [`RoutingOracle`] with straight-line and OSRM backends.
//! - [`triage`] -- [`TriageClassifier`] with keyword and HTTP backends.
//! - [`hospitals`] -- Destination hospital scoring.
//! - [`ranker`] -- [`CandidateRanker`], deterministic ambulance ranking.
//! - [`simulator`] -- [`MovementSimulator`], one task per dispatch.
//! - [`orchestrator`] -- [`Orchestrator`], dispatch and simulation
//!   lifecycle.
//! - [`retry`] -- Exponential backoff with jitter for HTTP collaborators.
//! - [`scenario`] -- Startup seed data, demo scenarios, random incidents.
//!
//! [`DispatchError`]: error::DispatchError
//! [`EntityStore`]: store::EntityStore
//! [`RoutingOracle`]: routing::RoutingOracle
//! [`TriageClassifier`]: triage::TriageClassifier
//! [`CandidateRanker`]: ranker::CandidateRanker
//! [`MovementSimulator`]: simulator::MovementSimulator
//! [`Orchestrator`]: orchestrator::Orchestrator

pub mod config;
pub mod error;
pub mod geo;
pub mod hospitals;
pub mod orchestrator;
pub mod ranker;
pub mod retry;
pub mod routing;
pub mod scenario;
pub mod simulator;
pub mod store;
pub mod triage;

pub use config::DispatchConfig;
pub use error::DispatchError;
pub use orchestrator::{CancelOutcome, DispatchOptions, DispatchOutcome, Orchestrator};
pub use routing::RoutingOracle;
pub use store::{EntityStore, NewHazard, NewIncident};
pub use triage::TriageClassifier;
