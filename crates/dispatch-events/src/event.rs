//! Typed event payloads and the wire envelope.
//!
//! On the wire every event is `{"type": ..., "data": ..., "timestamp":
//! ..., "seq": ...}`. Entity payloads are full records so a client can
//! apply any event, any number of times, by replacing its cached copy.

use chrono::{DateTime, Utc};
use dispatch_types::{
    Ambulance, AmbulanceId, Hazard, Hospital, HospitalId, Incident, IncidentId, Phase,
};
use serde::{Deserialize, Serialize};

/// An ambulance record together with its simulation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbulanceUpdate {
    /// The full ambulance record.
    #[serde(flatten)]
    pub ambulance: Ambulance,
    /// Incident the movement belongs to, if any.
    pub incident_id: Option<IncidentId>,
    /// Movement phase, when produced by a simulation.
    pub phase: Option<Phase>,
    /// Remaining travel time of the current leg.
    pub eta_seconds: Option<u32>,
}

/// An incident was removed from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentDeleted {
    /// The removed incident.
    pub incident_id: IncidentId,
}

/// A destination hospital was chosen for an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalSelected {
    /// The incident.
    pub incident_id: IncidentId,
    /// The chosen hospital.
    pub hospital_id: HospitalId,
    /// Its display name.
    pub hospital_name: String,
}

/// An incident reached COMPLETED through its simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationComplete {
    /// The incident.
    pub incident_id: IncidentId,
    /// The ambulance that served it.
    pub ambulance_id: AmbulanceId,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
}

/// A dispatch was cancelled before completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationCancelled {
    /// The incident.
    pub incident_id: IncidentId,
    /// The ambulance released by the cancellation, if one was bound.
    pub ambulance_id: Option<AmbulanceId>,
    /// Why it was cancelled.
    pub reason: String,
}

/// A state change published to every dispatcher session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchEvent {
    /// Ambulance position or status changed.
    AmbulanceUpdate(AmbulanceUpdate),
    /// A new incident was created.
    IncidentAdded(Incident),
    /// An incident changed.
    IncidentUpdate(Incident),
    /// A terminal incident was removed.
    IncidentDeleted(IncidentDeleted),
    /// A destination hospital was chosen.
    HospitalSelected(HospitalSelected),
    /// A hospital changed status or load.
    HospitalUpdate(Hospital),
    /// A hazard was created or changed.
    HazardUpdate(Hazard),
    /// A simulation brought its incident to COMPLETED.
    SimulationComplete(SimulationComplete),
    /// A dispatch was cancelled.
    SimulationCancelled(SimulationCancelled),
}

impl DispatchEvent {
    /// Wire tag of the event.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::AmbulanceUpdate(_) => "AMBULANCE_UPDATE",
            Self::IncidentAdded(_) => "INCIDENT_ADDED",
            Self::IncidentUpdate(_) => "INCIDENT_UPDATE",
            Self::IncidentDeleted(_) => "INCIDENT_DELETED",
            Self::HospitalSelected(_) => "HOSPITAL_SELECTED",
            Self::HospitalUpdate(_) => "HOSPITAL_UPDATE",
            Self::HazardUpdate(_) => "HAZARD_UPDATE",
            Self::SimulationComplete(_) => "SIMULATION_COMPLETE",
            Self::SimulationCancelled(_) => "SIMULATION_CANCELLED",
        }
    }

    /// Incident the event concerns, if any.
    pub fn incident_id(&self) -> Option<IncidentId> {
        match self {
            Self::AmbulanceUpdate(update) => update.incident_id,
            Self::IncidentAdded(incident) | Self::IncidentUpdate(incident) => Some(incident.id),
            Self::IncidentDeleted(deleted) => Some(deleted.incident_id),
            Self::HospitalSelected(selected) => Some(selected.incident_id),
            Self::SimulationComplete(complete) => Some(complete.incident_id),
            Self::SimulationCancelled(cancelled) => Some(cancelled.incident_id),
            Self::HospitalUpdate(_) | Self::HazardUpdate(_) => None,
        }
    }
}

/// A published event with its position in the global sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Strictly increasing sequence number.
    pub seq: u64,
    /// Publication time; never decreases along the sequence.
    pub timestamp: DateTime<Utc>,
    /// The event (`type` and `data` on the wire).
    #[serde(flatten)]
    pub event: DispatchEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_shape() {
        let envelope = EventEnvelope {
            seq: 4,
            timestamp: Utc::now(),
            event: DispatchEvent::IncidentDeleted(IncidentDeleted {
                incident_id: IncidentId::new(),
            }),
        };
        let json = serde_json::to_value(&envelope).unwrap_or_default();
        assert_eq!(json["type"], "INCIDENT_DELETED");
        assert_eq!(json["seq"], 4);
        assert!(json["data"]["incidentId"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn type_name_matches_serde_tag() {
        let event = DispatchEvent::SimulationCancelled(SimulationCancelled {
            incident_id: IncidentId::new(),
            ambulance_id: Some(AmbulanceId(3)),
            reason: String::from("operator"),
        });
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], event.type_name());
    }
}
