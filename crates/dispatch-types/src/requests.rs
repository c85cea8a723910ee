//! Request and response payloads for the dispatcher API.
//!
//! Request bodies derive [`Validate`] so handlers can reject malformed
//! coordinates and out-of-range parameters before they reach the store.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::Validate;

use crate::enums::{
    AmbulanceStatus, AmbulanceType, HazardType, HospitalStatus, IncidentStatus, Severity,
    TriageType,
};
use crate::ids::{AmbulanceId, IncidentId};
use crate::structs::{
    Ambulance, Caller, GeoPoint, HazardBounds, HospitalRecommendation, Incident, Route,
    RouteGeometry, TriageAnalysis,
};

/// Uniform envelope around every query and command response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// The payload.
    pub data: T,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Number of items for list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            count: None,
        }
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// Successful list response; `count` is the list length.
    pub fn list(data: Vec<T>) -> Self {
        let count = data.len();
        Self {
            success: true,
            data,
            message: None,
            count: Some(count),
        }
    }
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Body of `POST /incidents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CreateIncidentRequest {
    /// Scene location.
    #[validate(nested)]
    pub location: GeoPoint,
    /// Triage category.
    pub triage: TriageType,
    /// Optional description.
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
    /// Optional severity.
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Response of `POST /incidents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CreateIncidentResponse {
    /// The created incident.
    pub incident: Incident,
    /// Ranked hospital suggestions.
    pub recommendations: Vec<HospitalRecommendation>,
}

/// Body of `POST /incidents/{id}/assign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AssignAmbulanceRequest {
    /// Ambulance chosen by the dispatcher.
    pub ambulance_id: AmbulanceId,
    /// Notes recorded on the incident.
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub dispatcher_notes: Option<String>,
}

/// Response of manual assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AssignAmbulanceResponse {
    /// The incident after assignment.
    pub incident: Incident,
    /// The bound ambulance.
    pub ambulance: Ambulance,
}

/// Body of `PATCH /incidents/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UpdateIncidentStatusRequest {
    /// Target status.
    pub status: IncidentStatus,
}

/// Query string of `GET /incidents`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentsQuery {
    /// Only incidents in this status.
    pub status: Option<IncidentStatus>,
}

// ---------------------------------------------------------------------------
// Ambulances
// ---------------------------------------------------------------------------

/// Body of `PATCH /ambulances/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UpdateAmbulanceStatusRequest {
    /// Target status.
    pub status: AmbulanceStatus,
}

/// Body of `PATCH /ambulances/{id}/location`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct UpdateAmbulanceLocationRequest {
    /// Latitude in degrees.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    /// Longitude in degrees.
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

/// Query string of `GET /ambulances`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbulancesQuery {
    /// Only IDLE ambulances when `true`.
    #[serde(default)]
    pub idle: bool,
}

// ---------------------------------------------------------------------------
// Hospitals and hazards
// ---------------------------------------------------------------------------

/// Body of `POST /hospitals/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct UpdateHospitalStatusRequest {
    /// Operating status.
    pub status: HospitalStatus,
    /// Load percentage.
    #[validate(range(max = 100))]
    pub load: u8,
}

/// Body of `POST /hazards`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct CreateHazardRequest {
    /// Kind of hazard.
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    /// Description.
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    /// Affected area.
    #[validate(nested)]
    pub bounds: HazardBounds,
}

/// Body of `PATCH /hazards/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct UpdateHazardRequest {
    /// New active flag.
    #[serde(default)]
    pub active: Option<bool>,
    /// New description.
    #[validate(length(min = 1, max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Body of `POST /routes/calculate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct CalculateRouteRequest {
    /// Start point.
    #[validate(nested)]
    pub origin: GeoPoint,
    /// End point.
    #[validate(nested)]
    pub destination: GeoPoint,
}

/// Response of `POST /routes/calculate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CalculateRouteResponse {
    /// The route.
    pub route: Route,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Body of `POST /api/dispatch`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DispatchRequest {
    /// Incident to serve.
    pub incident_id: IncidentId,
    /// Latitude used for ranking.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    /// Longitude used for ranking.
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    /// Exact capability class required.
    #[serde(default)]
    pub required_type: Option<AmbulanceType>,
    /// Severity reported with the request.
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Triage category used to derive a preferred class.
    #[serde(default)]
    pub triage_type: Option<TriageType>,
}

/// Response of `POST /api/dispatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DispatchResponse {
    /// Bound ambulance.
    pub ambulance_id: AmbulanceId,
    /// Its callsign.
    pub ambulance_callsign: String,
    /// Travel time to the scene.
    pub eta_seconds: u32,
    /// Route length to the scene.
    pub distance_meters: f64,
    /// Route geometry to the scene.
    pub route: RouteGeometry,
    /// Incident after dispatch.
    pub incident: Incident,
}

/// Query string of `GET /api/dispatch/candidates`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesQuery {
    /// Latitude of the incident.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    /// Longitude of the incident.
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    /// Exact capability class required.
    #[serde(default)]
    pub required_type: Option<AmbulanceType>,
    /// Triage category used to derive a preferred class.
    #[serde(default)]
    pub triage_type: Option<TriageType>,
}

// ---------------------------------------------------------------------------
// Scenarios and seeding
// ---------------------------------------------------------------------------

/// Body of `POST /api/simulation/scenario`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CreateScenarioRequest {
    /// Latitude of the scene.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    /// Longitude of the scene.
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    /// What the caller reported.
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    /// Caller name.
    #[serde(default)]
    pub caller_name: Option<String>,
    /// Caller phone number.
    #[serde(default)]
    pub caller_phone: Option<String>,
}

/// Response of `POST /api/simulation/scenario`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CreateScenarioResponse {
    /// The created incident.
    pub incident: Incident,
    /// The reporting caller.
    pub user: Caller,
    /// Classifier output, `None` when the classifier was unavailable.
    pub analysis: Option<TriageAnalysis>,
}

/// Body of `POST /api/simulation/seed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SeedIncidentsRequest {
    /// Number of incidents to create.
    #[validate(range(min = 1, max = 50))]
    pub count: u32,
    /// Latitude of the disc centre.
    #[validate(range(min = -90.0, max = 90.0))]
    pub center_lat: f64,
    /// Longitude of the disc centre.
    #[validate(range(min = -180.0, max = 180.0))]
    pub center_lng: f64,
    /// Disc radius in kilometers.
    #[validate(range(min = 0.1, max = 50.0))]
    pub radius_km: f64,
}

/// Response of `POST /api/simulation/seed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SeedIncidentsResponse {
    /// Number of incidents created.
    pub created: u32,
    /// The created incidents.
    pub incidents: Vec<Incident>,
}

/// Body of `POST /api/ai/analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct AnalyzeTextRequest {
    /// Text to classify.
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}
