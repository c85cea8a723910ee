//! Dispatch and simulation control endpoints.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/dispatch` | Auto-dispatch the best candidate |
//! | `GET` | `/api/dispatch/candidates` | Ranked candidates for a location |
//! | `DELETE` | `/api/dispatch/simulations/{incidentId}` | Cancel one simulation |
//! | `POST` | `/api/simulation/scenario` | Incident from a caller report |
//! | `POST` | `/api/simulation/seed` | Random incidents around a point |
//! | `GET` | `/api/simulation/status` | Running simulations |
//! | `DELETE` | `/api/simulation/all` | Cancel every simulation |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use dispatch_core::scenario;
use dispatch_core::{CancelOutcome, DispatchOptions};
use dispatch_types::{
    AmbulanceCandidate, ApiResponse, CandidatesQuery, CreateScenarioRequest,
    CreateScenarioResponse, DispatchRequest, DispatchResponse, GeoPoint, IncidentId,
    SeedIncidentsRequest, SeedIncidentsResponse, SimulationStatus,
};
use serde::Serialize;
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, DispatcherId};
use crate::state::AppState;

/// Response of `DELETE /api/dispatch/simulations/{incidentId}`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSimulationResponse {
    /// The incident.
    pub incident_id: IncidentId,
    /// What the cancellation did.
    pub outcome: CancelOutcome,
}

/// Response of `DELETE /api/simulation/all`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CancelAllResponse {
    /// Simulations stopped.
    pub cancelled: usize,
}

/// `POST /api/dispatch`: rank, bind the best candidate, and start its
/// simulation.
pub async fn auto_dispatch(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiJson(body): ApiJson<DispatchRequest>,
) -> Result<Json<ApiResponse<DispatchResponse>>, ApiError> {
    body.validate()?;
    let options = DispatchOptions {
        location: Some(GeoPoint::new(body.lat, body.lng)),
        required_type: body.required_type,
        triage: body.triage_type,
        severity: body.severity,
    };
    let outcome = state
        .orchestrator
        .dispatch(body.incident_id, options)
        .await?;
    info!(
        %dispatcher,
        incident_id = %body.incident_id,
        ambulance = %outcome.ambulance.callsign,
        eta_seconds = outcome.route.eta_seconds,
        "auto-dispatched"
    );
    let message = format!("{} dispatched", outcome.ambulance.callsign);
    Ok(Json(
        ApiResponse::ok(outcome.into_response()).with_message(message),
    ))
}

/// `GET /api/dispatch/candidates`.
pub async fn candidates(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<CandidatesQuery>,
) -> Result<Json<ApiResponse<Vec<AmbulanceCandidate>>>, ApiError> {
    query.validate()?;
    let candidates = state
        .orchestrator
        .candidates(
            GeoPoint::new(query.lat, query.lng),
            query.required_type,
            query.triage_type,
        )
        .await;
    Ok(Json(ApiResponse::list(candidates)))
}

/// `DELETE /api/dispatch/simulations/{incidentId}`.
pub async fn cancel_simulation(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiPath(incident_id): ApiPath<IncidentId>,
) -> Result<Json<ApiResponse<CancelSimulationResponse>>, ApiError> {
    let outcome = state.orchestrator.cancel_simulation(incident_id).await?;
    info!(%dispatcher, %incident_id, ?outcome, "simulation cancel requested");
    Ok(Json(ApiResponse::ok(CancelSimulationResponse {
        incident_id,
        outcome,
    })))
}

/// `POST /api/simulation/scenario`.
pub async fn create_scenario(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CreateScenarioRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateScenarioResponse>>), ApiError> {
    body.validate()?;
    let response = scenario::create_scenario(&state.orchestrator, &state.classifier, body).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

/// `POST /api/simulation/seed`.
pub async fn seed_incidents(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SeedIncidentsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SeedIncidentsResponse>>), ApiError> {
    body.validate()?;
    let response = state.generator.seed(&state.orchestrator, &body).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

/// `GET /api/simulation/status`.
pub async fn simulation_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<SimulationStatus>> {
    Json(ApiResponse::ok(state.orchestrator.status()))
}

/// `DELETE /api/simulation/all`.
pub async fn cancel_all(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
) -> Json<ApiResponse<CancelAllResponse>> {
    let cancelled = state.orchestrator.cancel_all().await;
    info!(%dispatcher, cancelled, "all simulations cancelled by dispatcher");
    Json(ApiResponse::ok(CancelAllResponse { cancelled }))
}
