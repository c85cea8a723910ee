//! Core entity records: incidents, ambulances, hospitals, hazards, and
//! the derived shapes (routes, candidates, recommendations, snapshots)
//! that flow between the engine and the dashboard.
//!
//! Every record is serialized in full on the event stream. Clients
//! replace their cached copy by id instead of merging partial patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::Validate;

use crate::enums::{
    AmbulanceStatus, AmbulanceType, HazardType, HospitalCapability, HospitalStatus,
    IncidentCategory, IncidentStatus, Phase, Severity, TriageType,
};
use crate::ids::{AmbulanceId, CallerId, HazardId, HospitalId, IncidentId};

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct GeoPoint {
    /// Latitude in degrees.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    /// Longitude in degrees.
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

impl GeoPoint {
    /// Construct a point from latitude and longitude in degrees.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// `GeoJSON` line string: coordinates are `[lng, lat]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RouteGeometry {
    /// Always `"LineString"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered `[lng, lat]` pairs.
    pub coordinates: Vec<(f64, f64)>,
}

impl RouteGeometry {
    /// Build a line string from ordered points.
    pub fn from_points(points: &[GeoPoint]) -> Self {
        Self {
            kind: String::from("LineString"),
            coordinates: points.iter().map(|p| (p.lng, p.lat)).collect(),
        }
    }

    /// Return the ordered points of the line string.
    pub fn points(&self) -> Vec<GeoPoint> {
        self.coordinates
            .iter()
            .map(|&(lng, lat)| GeoPoint::new(lat, lng))
            .collect()
    }
}

/// A drivable route between two points.
///
/// Produced by the routing oracle (or its straight-line fallback) and
/// cached only for the lifetime of the simulation that uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Route {
    /// Path geometry.
    pub geometry: RouteGeometry,
    /// Expected travel time in seconds.
    pub eta_seconds: u32,
    /// Path length in meters.
    pub distance_meters: f64,
    /// `true` when the route is a straight-line estimate rather than an
    /// answer from the routing service.
    #[serde(default)]
    pub estimated: bool,
}

// ---------------------------------------------------------------------------
// Incident
// ---------------------------------------------------------------------------

/// An emergency incident.
///
/// `assigned_ambulance_id` is `Some` exactly when the status is one of
/// `ASSIGNED`, `DISPATCHED`, `EN_ROUTE`, `ARRIVED`, `TRANSPORTING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Incident {
    /// Opaque identifier.
    pub id: IncidentId,
    /// Scene location.
    pub location: GeoPoint,
    /// Clinical triage category.
    pub triage: TriageType,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// Free-text description from the caller or dispatcher.
    pub description: Option<String>,
    /// Category derived by the triage classifier.
    pub category: Option<IncidentCategory>,
    /// Severity derived by the triage classifier or supplied on dispatch.
    pub severity: Option<Severity>,
    /// Classifier confidence in `[0, 1]`.
    pub ai_confidence: Option<f64>,
    /// Whether the incident was produced by a demo scenario.
    pub is_ai_generated: bool,
    /// Caller name, when known.
    pub caller_name: Option<String>,
    /// Caller phone number, when known.
    pub caller_phone: Option<String>,
    /// Notes entered by the dispatcher.
    pub dispatcher_notes: Option<String>,
    /// Ambulance currently bound to the incident.
    pub assigned_ambulance_id: Option<AmbulanceId>,
    /// Hospital recommended for transport.
    pub recommended_hospital_id: Option<HospitalId>,
    /// Remaining travel time of the current leg, in seconds.
    pub eta_seconds: Option<u32>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ambulance
// ---------------------------------------------------------------------------

/// A pre-provisioned ambulance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Ambulance {
    /// Fleet number.
    pub id: AmbulanceId,
    /// Radio callsign.
    pub callsign: String,
    /// Capability class.
    #[serde(rename = "type")]
    pub ambulance_type: AmbulanceType,
    /// Operational status.
    pub status: AmbulanceStatus,
    /// Current position.
    pub location: GeoPoint,
    /// Home hospital the ambulance returns to.
    pub hospital_id: Option<HospitalId>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Hospital
// ---------------------------------------------------------------------------

/// A receiving hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Hospital {
    /// Identifier.
    pub id: HospitalId,
    /// Display name.
    pub name: String,
    /// Emergency department entrance.
    pub location: GeoPoint,
    /// Clinical capabilities.
    pub capabilities: Vec<HospitalCapability>,
    /// Operating status.
    pub status: HospitalStatus,
    /// Current load as a percentage (0-100).
    pub load: u8,
    /// Number of ambulances homed here. Derived at read time.
    pub ambulance_count: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Hospital {
    /// Whether the hospital offers `capability`.
    pub fn has_capability(&self, capability: HospitalCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Hospital detail including the ambulances homed there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct HospitalWithAmbulances {
    /// The hospital record.
    #[serde(flatten)]
    pub hospital: Hospital,
    /// Ambulances whose home is this hospital.
    pub ambulances: Vec<Ambulance>,
}

/// A scored hospital suggestion for an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct HospitalRecommendation {
    /// The hospital.
    pub hospital: Hospital,
    /// Score in `[0, 1]`, higher is better.
    pub score: f64,
    /// Estimated travel time from the scene.
    pub eta_seconds: u32,
    /// Straight-line distance from the scene.
    pub distance_meters: f64,
}

// ---------------------------------------------------------------------------
// Hazard
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box of a hazard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct HazardBounds {
    /// Southern edge.
    #[validate(range(min = -90.0, max = 90.0))]
    pub min_lat: f64,
    /// Northern edge.
    #[validate(range(min = -90.0, max = 90.0))]
    pub max_lat: f64,
    /// Western edge.
    #[validate(range(min = -180.0, max = 180.0))]
    pub min_lng: f64,
    /// Eastern edge.
    #[validate(range(min = -180.0, max = 180.0))]
    pub max_lng: f64,
}

impl HazardBounds {
    /// Whether `point` lies inside the box (edges inclusive).
    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }
}

/// A road hazard that may slow routes crossing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Hazard {
    /// Identifier.
    pub id: HazardId,
    /// Kind of hazard.
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    /// Description.
    pub description: String,
    /// Affected area.
    pub bounds: HazardBounds,
    /// Whether the hazard currently affects routing.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ranking and triage
// ---------------------------------------------------------------------------

/// An ambulance considered for an incident, with its travel estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AmbulanceCandidate {
    /// The ambulance as it was when ranked.
    pub ambulance: Ambulance,
    /// Travel time to the incident, including hazard penalties.
    pub eta_seconds: u32,
    /// Route length to the incident.
    pub distance_meters: f64,
    /// Great-circle distance used for the pre-filter.
    pub straight_line_meters: f64,
    /// Whether the type meets the preferred capability.
    pub compatible: bool,
    /// The route to the incident.
    pub route: Route,
}

/// Structured output of the triage classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TriageAnalysis {
    /// Coarse category.
    pub category: IncidentCategory,
    /// Severity.
    pub severity: Severity,
    /// Clinical triage, when one could be inferred.
    pub triage_type: Option<TriageType>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Keywords that drove the classification.
    pub keywords: Vec<String>,
}

/// A caller reporting a scenario incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Caller {
    /// Caller identifier.
    pub id: CallerId,
    /// Caller name.
    pub name: String,
    /// Caller phone number.
    pub phone: String,
}

// ---------------------------------------------------------------------------
// Snapshots and simulation status
// ---------------------------------------------------------------------------

/// Full authoritative state at a point in the event sequence.
///
/// Every event with `seq > snapshot.seq` describes a change that is not
/// yet reflected in the snapshot; every event with `seq <= snapshot.seq`
/// is already included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Sequence number of the last event reflected in this snapshot.
    pub seq: u64,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// All incidents, oldest first.
    pub incidents: Vec<Incident>,
    /// All ambulances, by id.
    pub ambulances: Vec<Ambulance>,
    /// All hospitals, by id.
    pub hospitals: Vec<Hospital>,
    /// All hazards, oldest first.
    pub hazards: Vec<Hazard>,
    /// Ambulances currently moving under a simulation, by ambulance id.
    pub motions: Vec<AmbulanceMotion>,
}

/// Where a simulated ambulance is in its trip, as of the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AmbulanceMotion {
    /// The moving ambulance.
    pub ambulance_id: AmbulanceId,
    /// Incident the trip belongs to (the completed one while returning).
    pub incident_id: IncidentId,
    /// Current leg.
    pub phase: Phase,
    /// Remaining seconds on the current leg.
    pub eta_seconds: u32,
}

/// An active movement simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SimulationInfo {
    /// Incident being served.
    pub incident_id: IncidentId,
    /// Ambulance being animated.
    pub ambulance_id: AmbulanceId,
    /// Current movement phase.
    pub phase: Phase,
    /// When the simulation started.
    pub started_at: DateTime<Utc>,
}

/// Summary of all active simulations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SimulationStatus {
    /// Number of active simulations.
    pub active_simulations: u32,
    /// One entry per active simulation.
    pub incidents: Vec<SimulationInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_round_trips_lng_lat_order() {
        let points = [GeoPoint::new(3.0, 101.0), GeoPoint::new(3.1, 101.2)];
        let geometry = RouteGeometry::from_points(&points);
        let json = serde_json::to_value(&geometry).unwrap_or_default();
        assert_eq!(json["type"], "LineString");
        assert_eq!(json["coordinates"][0][0], 101.0);
        assert_eq!(json["coordinates"][0][1], 3.0);
        assert_eq!(geometry.points(), points.to_vec());
    }

    #[test]
    fn hazard_bounds_contains_edges() {
        let bounds = HazardBounds {
            min_lat: 3.0,
            max_lat: 3.2,
            min_lng: 101.0,
            max_lng: 101.2,
        };
        assert!(bounds.contains(GeoPoint::new(3.0, 101.1)));
        assert!(bounds.contains(GeoPoint::new(3.1, 101.2)));
        assert!(!bounds.contains(GeoPoint::new(3.3, 101.1)));
    }

    #[test]
    fn ambulance_type_field_is_named_type() {
        let ambulance = Ambulance {
            id: AmbulanceId(1),
            callsign: String::from("MEDIC-1"),
            ambulance_type: AmbulanceType::Als,
            status: AmbulanceStatus::Idle,
            location: GeoPoint::new(3.1, 101.7),
            hospital_id: Some(HospitalId(2)),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&ambulance).unwrap_or_default();
        assert_eq!(json["type"], "ALS");
        assert_eq!(json["hospitalId"], 2);
        assert_eq!(json["status"], "IDLE");
    }
}
