//! Axum router construction for the dispatcher API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{dispatch, fleet, handlers, incidents, ws};

/// Build the complete Axum router for the dispatcher API.
///
/// CORS allows any origin; the API has no authentication.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/snapshot", get(handlers::snapshot))
        // WebSocket
        .route("/ws/dispatch", get(ws::ws_dispatch))
        // Incidents
        .route(
            "/incidents",
            get(incidents::list_incidents).post(incidents::create_incident),
        )
        .route("/incidents/active", get(incidents::list_active_incidents))
        .route(
            "/incidents/{id}",
            get(incidents::get_incident).delete(incidents::delete_incident),
        )
        .route("/incidents/{id}/assign", post(incidents::assign_ambulance))
        .route(
            "/incidents/{id}/status",
            patch(incidents::update_incident_status),
        )
        .route(
            "/incidents/{id}/candidates",
            get(incidents::incident_candidates),
        )
        .route(
            "/incidents/{id}/hospitals",
            get(incidents::incident_hospitals),
        )
        // Ambulances
        .route("/ambulances", get(fleet::list_ambulances))
        .route("/ambulances/available", get(fleet::available_ambulances))
        .route("/ambulances/{id}", get(fleet::get_ambulance))
        .route(
            "/ambulances/{id}/status",
            patch(fleet::update_ambulance_status),
        )
        .route(
            "/ambulances/{id}/location",
            patch(fleet::update_ambulance_location),
        )
        // Hospitals
        .route("/hospitals", get(fleet::list_hospitals))
        .route("/hospitals/{id}", get(fleet::get_hospital))
        .route("/hospitals/{id}/status", post(fleet::update_hospital_status))
        // Hazards
        .route(
            "/hazards",
            get(fleet::list_hazards).post(fleet::create_hazard),
        )
        .route(
            "/hazards/{id}",
            get(fleet::get_hazard).patch(fleet::update_hazard),
        )
        // Routing and triage
        .route("/routes/calculate", post(handlers::calculate_route))
        .route("/api/ai/analyze", post(handlers::analyze_text))
        // Dispatch
        .route("/api/dispatch", post(dispatch::auto_dispatch))
        .route("/api/dispatch/candidates", get(dispatch::candidates))
        .route(
            "/api/dispatch/simulations/{incident_id}",
            delete(dispatch::cancel_simulation),
        )
        // Simulation
        .route("/api/simulation/scenario", post(dispatch::create_scenario))
        .route("/api/simulation/seed", post(dispatch::seed_incidents))
        .route("/api/simulation/status", get(dispatch::simulation_status))
        .route("/api/simulation/all", delete(dispatch::cancel_all))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
