//! Ambulance, hospital, and hazard endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use dispatch_core::NewHazard;
use dispatch_types::{
    Ambulance, AmbulanceId, AmbulancesQuery, ApiResponse, CreateHazardRequest, GeoPoint, Hazard,
    HazardId, Hospital, HospitalId, HospitalWithAmbulances, UpdateAmbulanceLocationRequest,
    UpdateAmbulanceStatusRequest, UpdateHazardRequest, UpdateHospitalStatusRequest,
};
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, DispatcherId};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Ambulances
// ---------------------------------------------------------------------------

/// `GET /ambulances`, IDLE only with `?idle=true`.
pub async fn list_ambulances(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<AmbulancesQuery>,
) -> Json<ApiResponse<Vec<Ambulance>>> {
    Json(ApiResponse::list(
        state.store().list_ambulances(query.idle).await,
    ))
}

/// `GET /ambulances/available`.
pub async fn available_ambulances(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<Ambulance>>> {
    Json(ApiResponse::list(state.store().list_ambulances(true).await))
}

/// `GET /ambulances/{id}`.
pub async fn get_ambulance(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<AmbulanceId>,
) -> Result<Json<ApiResponse<Ambulance>>, ApiError> {
    Ok(Json(ApiResponse::ok(state.store().get_ambulance(id).await?)))
}

/// `PATCH /ambulances/{id}/status`.
pub async fn update_ambulance_status(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiPath(id): ApiPath<AmbulanceId>,
    ApiJson(body): ApiJson<UpdateAmbulanceStatusRequest>,
) -> Result<Json<ApiResponse<Ambulance>>, ApiError> {
    let ambulance = state
        .store()
        .update_ambulance_status(id, body.status)
        .await?;
    info!(%dispatcher, ambulance_id = %id, status = %ambulance.status, "ambulance status set");
    Ok(Json(ApiResponse::ok(ambulance)))
}

/// `PATCH /ambulances/{id}/location`.
pub async fn update_ambulance_location(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<AmbulanceId>,
    ApiJson(body): ApiJson<UpdateAmbulanceLocationRequest>,
) -> Result<Json<ApiResponse<Ambulance>>, ApiError> {
    body.validate()?;
    let ambulance = state
        .store()
        .update_ambulance_location(id, GeoPoint::new(body.lat, body.lng))
        .await?;
    Ok(Json(ApiResponse::ok(ambulance)))
}

// ---------------------------------------------------------------------------
// Hospitals
// ---------------------------------------------------------------------------

/// `GET /hospitals`.
pub async fn list_hospitals(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<Hospital>>> {
    Json(ApiResponse::list(state.store().list_hospitals().await))
}

/// `GET /hospitals/{id}` with the ambulances homed there.
pub async fn get_hospital(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<HospitalId>,
) -> Result<Json<ApiResponse<HospitalWithAmbulances>>, ApiError> {
    Ok(Json(ApiResponse::ok(
        state.store().hospital_detail(id).await?,
    )))
}

/// `POST /hospitals/{id}/status`.
pub async fn update_hospital_status(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiPath(id): ApiPath<HospitalId>,
    ApiJson(body): ApiJson<UpdateHospitalStatusRequest>,
) -> Result<Json<ApiResponse<Hospital>>, ApiError> {
    body.validate()?;
    let hospital = state
        .store()
        .update_hospital_status(id, body.status, body.load)
        .await?;
    info!(%dispatcher, hospital_id = %id, load = body.load, "hospital status set");
    Ok(Json(ApiResponse::ok(hospital)))
}

// ---------------------------------------------------------------------------
// Hazards
// ---------------------------------------------------------------------------

/// `GET /hazards`.
pub async fn list_hazards(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<Hazard>>> {
    Json(ApiResponse::list(state.store().list_hazards().await))
}

/// `POST /hazards`.
pub async fn create_hazard(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiJson(body): ApiJson<CreateHazardRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Hazard>>), ApiError> {
    body.validate()?;
    let hazard = state
        .store()
        .create_hazard(NewHazard {
            hazard_type: body.hazard_type,
            description: body.description,
            bounds: body.bounds,
        })
        .await?;
    info!(%dispatcher, hazard_id = %hazard.id, "hazard reported");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(hazard))))
}

/// `GET /hazards/{id}`.
pub async fn get_hazard(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<HazardId>,
) -> Result<Json<ApiResponse<Hazard>>, ApiError> {
    Ok(Json(ApiResponse::ok(state.store().get_hazard(id).await?)))
}

/// `PATCH /hazards/{id}`.
pub async fn update_hazard(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<HazardId>,
    ApiJson(body): ApiJson<UpdateHazardRequest>,
) -> Result<Json<ApiResponse<Hazard>>, ApiError> {
    body.validate()?;
    let hazard = state
        .store()
        .update_hazard(id, body.active, body.description)
        .await?;
    Ok(Json(ApiResponse::ok(hazard)))
}
