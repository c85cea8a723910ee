//! Incident endpoints.
//!
//! Commands go through the [`Orchestrator`](dispatch_core::Orchestrator)
//! so that an incident driven by a running simulation cannot be moved by
//! hand, and cancellation stops the simulation first.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use dispatch_core::NewIncident;
use dispatch_types::{
    AmbulanceCandidate, ApiResponse, AssignAmbulanceRequest, AssignAmbulanceResponse,
    CreateIncidentRequest, CreateIncidentResponse, HospitalRecommendation, Incident, IncidentId,
    IncidentsQuery, UpdateIncidentStatusRequest,
};
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, DispatcherId};
use crate::state::AppState;

/// `GET /incidents`, optionally filtered by `?status=`.
pub async fn list_incidents(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<IncidentsQuery>,
) -> Json<ApiResponse<Vec<Incident>>> {
    Json(ApiResponse::list(
        state.store().list_incidents(query.status).await,
    ))
}

/// `GET /incidents/active`: incidents not yet completed or cancelled.
pub async fn list_active_incidents(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<Incident>>> {
    Json(ApiResponse::list(state.store().list_active_incidents().await))
}

/// `POST /incidents`: create a PENDING incident and recommend hospitals.
pub async fn create_incident(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiJson(body): ApiJson<CreateIncidentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateIncidentResponse>>), ApiError> {
    body.validate()?;
    let mut new = NewIncident::new(body.location, body.triage);
    new.description = body.description;
    new.severity = body.severity;

    let (incident, recommendations) = state.orchestrator.create_incident(new).await?;
    info!(%dispatcher, incident_id = %incident.id, "incident created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CreateIncidentResponse {
            incident,
            recommendations,
        })),
    ))
}

/// `GET /incidents/{id}`.
pub async fn get_incident(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<Json<ApiResponse<Incident>>, ApiError> {
    Ok(Json(ApiResponse::ok(state.store().get_incident(id).await?)))
}

/// `DELETE /incidents/{id}`: only completed or cancelled incidents.
pub async fn delete_incident(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<Json<ApiResponse<Option<Incident>>>, ApiError> {
    state.store().delete_incident(id).await?;
    info!(%dispatcher, incident_id = %id, "incident deleted by dispatcher");
    Ok(Json(ApiResponse::ok(None).with_message("incident deleted")))
}

/// `POST /incidents/{id}/assign`: bind a dispatcher-chosen ambulance.
pub async fn assign_ambulance(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(body): ApiJson<AssignAmbulanceRequest>,
) -> Result<Json<ApiResponse<AssignAmbulanceResponse>>, ApiError> {
    body.validate()?;
    let outcome = state
        .orchestrator
        .assign_manual(id, body.ambulance_id, body.dispatcher_notes)
        .await?;
    info!(
        %dispatcher,
        incident_id = %id,
        ambulance_id = %outcome.ambulance.id,
        "ambulance assigned manually"
    );
    Ok(Json(ApiResponse::ok(AssignAmbulanceResponse {
        incident: outcome.incident,
        ambulance: outcome.ambulance,
    })))
}

/// `PATCH /incidents/{id}/status`.
pub async fn update_incident_status(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(body): ApiJson<UpdateIncidentStatusRequest>,
) -> Result<Json<ApiResponse<Incident>>, ApiError> {
    let incident = state
        .orchestrator
        .update_incident_status(id, body.status)
        .await?;
    info!(%dispatcher, incident_id = %id, status = %incident.status, "incident status set");
    Ok(Json(ApiResponse::ok(incident)))
}

/// `GET /incidents/{id}/candidates`: ranked ambulances for the incident.
pub async fn incident_candidates(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<Json<ApiResponse<Vec<AmbulanceCandidate>>>, ApiError> {
    let candidates = state.orchestrator.candidates_for_incident(id).await?;
    Ok(Json(ApiResponse::list(candidates)))
}

/// `GET /incidents/{id}/hospitals`: destination hospitals, best first.
pub async fn incident_hospitals(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<Json<ApiResponse<Vec<HospitalRecommendation>>>, ApiError> {
    let recommendations = state.orchestrator.recommend_hospitals(id).await?;
    Ok(Json(ApiResponse::list(recommendations)))
}
