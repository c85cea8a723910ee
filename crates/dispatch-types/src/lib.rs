//! Shared type definitions for the emergency dispatch engine.
//!
//! This crate is the single source of truth for the entity shapes used
//! across the workspace and by the dispatcher dashboard. Types flow
//! downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers for incidents, ambulances, hospitals, hazards
//! - [`enums`] -- Statuses, capability classes, triage categories, phases
//! - [`structs`] -- Entity records, routes, candidates, snapshots
//! - [`requests`] -- API request/response payloads and the response envelope

pub mod enums;
pub mod ids;
pub mod requests;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    AmbulanceStatus, AmbulanceType, HazardType, HospitalCapability, HospitalStatus,
    IncidentCategory, IncidentStatus, Phase, Severity, TriageType,
};
pub use ids::{AmbulanceId, CallerId, HazardId, HospitalId, IncidentId};
pub use requests::{
    AmbulancesQuery, AnalyzeTextRequest, ApiResponse, AssignAmbulanceRequest,
    AssignAmbulanceResponse, CalculateRouteRequest, CalculateRouteResponse, CandidatesQuery,
    CreateHazardRequest, CreateIncidentRequest, CreateIncidentResponse, CreateScenarioRequest,
    CreateScenarioResponse, DispatchRequest, DispatchResponse, IncidentsQuery,
    SeedIncidentsRequest, SeedIncidentsResponse, UpdateAmbulanceLocationRequest,
    UpdateAmbulanceStatusRequest, UpdateHazardRequest, UpdateHospitalStatusRequest,
    UpdateIncidentStatusRequest,
};
pub use structs::{
    Ambulance, AmbulanceCandidate, AmbulanceMotion, Caller, GeoPoint, Hazard, HazardBounds, Hospital,
    HospitalRecommendation, HospitalWithAmbulances, Incident, Route, RouteGeometry, SimulationInfo,
    SimulationStatus, Snapshot, TriageAnalysis,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. The files are written to the
        // `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::IncidentId::export_all();
        let _ = crate::ids::HazardId::export_all();
        let _ = crate::ids::AmbulanceId::export_all();
        let _ = crate::ids::HospitalId::export_all();
        let _ = crate::ids::CallerId::export_all();

        // Records (exporting a record also exports the enums it references)
        let _ = crate::structs::Incident::export_all();
        let _ = crate::structs::Ambulance::export_all();
        let _ = crate::structs::HospitalWithAmbulances::export_all();
        let _ = crate::structs::HospitalRecommendation::export_all();
        let _ = crate::structs::Hazard::export_all();
        let _ = crate::structs::AmbulanceCandidate::export_all();
        let _ = crate::structs::Snapshot::export_all();
        let _ = crate::structs::SimulationStatus::export_all();

        // Requests and responses
        let _ = crate::requests::CreateIncidentResponse::export_all();
        let _ = crate::requests::AssignAmbulanceResponse::export_all();
        let _ = crate::requests::DispatchRequest::export_all();
        let _ = crate::requests::DispatchResponse::export_all();
        let _ = crate::requests::CreateScenarioResponse::export_all();
        let _ = crate::requests::SeedIncidentsResponse::export_all();
    }
}
