//! Enumeration types for the dispatch engine.
//!
//! Wire names follow the dashboard contract: statuses and capability
//! classes are SCREAMING case, triage categories keep their clinical
//! spelling (`STEMI`, `Stroke`, ...).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Clinical triage category of an incident.
///
/// Drives both the minimum ambulance capability and the hospital
/// capability used for recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TriageType {
    /// ST-elevation myocardial infarction.
    #[serde(rename = "STEMI")]
    Stemi,
    /// Suspected stroke.
    Stroke,
    /// Physical trauma (collisions, falls, wounds).
    Trauma,
    /// Burn injuries.
    Burns,
    /// Paediatric emergency.
    Pediatric,
    /// Anything not covered by a specialised category.
    General,
}

impl TriageType {
    /// All triage categories, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Stemi,
        Self::Stroke,
        Self::Trauma,
        Self::Burns,
        Self::Pediatric,
        Self::General,
    ];

    /// Hospital capability required to receive this patient.
    pub const fn required_capability(self) -> HospitalCapability {
        match self {
            Self::Stemi => HospitalCapability::Pci,
            Self::Stroke => HospitalCapability::Stroke,
            Self::Trauma => HospitalCapability::Trauma,
            Self::Burns => HospitalCapability::Burns,
            Self::Pediatric => HospitalCapability::Pediatric,
            Self::General => HospitalCapability::General,
        }
    }

    /// Minimum ambulance capability class preferred for this category.
    pub const fn preferred_ambulance(self) -> AmbulanceType {
        match self {
            Self::General => AmbulanceType::Bls,
            Self::Stemi | Self::Stroke | Self::Trauma | Self::Burns | Self::Pediatric => {
                AmbulanceType::Als
            }
        }
    }
}

/// Lifecycle status of an incident.
///
/// The legal transitions are defined by
/// [`IncidentStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum IncidentStatus {
    /// Created, waiting for an ambulance.
    Pending,
    /// An ambulance is bound but not yet rolling.
    Assigned,
    /// Dispatch order issued to the crew.
    Dispatched,
    /// Ambulance travelling to the scene.
    EnRoute,
    /// Ambulance at the scene.
    Arrived,
    /// Patient being carried to hospital.
    Transporting,
    /// Incident closed successfully (terminal).
    Completed,
    /// Incident abandoned (terminal).
    Cancelled,
}

impl IncidentStatus {
    /// Whether no further mutation is permitted.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether an incident in this status must reference an ambulance.
    pub const fn holds_ambulance(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::Dispatched | Self::EnRoute | Self::Arrived | Self::Transporting
        )
    }

    /// Whether `self -> next` is an edge of the incident state graph.
    ///
    /// The forward chain is `PENDING -> ASSIGNED -> DISPATCHED -> EN_ROUTE
    /// -> ARRIVED -> TRANSPORTING -> COMPLETED`. `ARRIVED -> COMPLETED`
    /// covers patients treated and released at the scene. `CANCELLED` is
    /// reachable from every non-terminal state.
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Assigned)
            | (Self::Assigned, Self::Dispatched)
            | (Self::Dispatched, Self::EnRoute)
            | (Self::EnRoute, Self::Arrived)
            | (Self::Arrived, Self::Transporting | Self::Completed)
            | (Self::Transporting, Self::Completed) => true,
            (from, Self::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Wire name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::Dispatched => "DISPATCHED",
            Self::EnRoute => "EN_ROUTE",
            Self::Arrived => "ARRIVED",
            Self::Transporting => "TRANSPORTING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category reported by the triage classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum IncidentCategory {
    /// Medical emergency.
    Medical,
    /// Fire related.
    Fire,
    /// Road or workplace accident.
    Accident,
    /// Unclassified.
    Other,
}

/// Severity reported by the triage classifier or the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum Severity {
    /// Life threatening.
    High,
    /// Not immediately life threatening.
    Low,
}

// ---------------------------------------------------------------------------
// Ambulances
// ---------------------------------------------------------------------------

/// Capability class of an ambulance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum AmbulanceType {
    /// Basic life support.
    Bls,
    /// Advanced life support.
    Als,
    /// Critical care transport.
    Cct,
    /// Rapid response vehicle (single responder, no stretcher).
    Rrv,
}

impl AmbulanceType {
    /// Capability rank used for matching: `RRV < BLS < ALS < CCT`.
    pub const fn capability_rank(self) -> u8 {
        match self {
            Self::Rrv => 0,
            Self::Bls => 1,
            Self::Als => 2,
            Self::Cct => 3,
        }
    }

    /// Whether this class can cover work that needs `required`.
    pub const fn satisfies(self, required: Self) -> bool {
        self.capability_rank() >= required.capability_rank()
    }

    /// Wire name of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bls => "BLS",
            Self::Als => "ALS",
            Self::Cct => "CCT",
            Self::Rrv => "RRV",
        }
    }
}

/// Operational status of an ambulance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum AmbulanceStatus {
    /// Available for assignment.
    Idle,
    /// Driving to an incident.
    EnRoute,
    /// At the incident scene.
    OnScene,
    /// Carrying a patient to hospital.
    Transporting,
}

impl AmbulanceStatus {
    /// Wire name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::EnRoute => "EN_ROUTE",
            Self::OnScene => "ON_SCENE",
            Self::Transporting => "TRANSPORTING",
        }
    }
}

impl core::fmt::Display for AmbulanceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movement phase of an active dispatch simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Driving to the incident location.
    ToScene,
    /// Carrying the patient to the recommended hospital.
    ToHospital,
    /// Driving back to the home hospital after completion.
    Returning,
}

// ---------------------------------------------------------------------------
// Hospitals
// ---------------------------------------------------------------------------

/// Clinical capability offered by a hospital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum HospitalCapability {
    /// Percutaneous coronary intervention (cath lab).
    Pci,
    /// Acute stroke unit.
    Stroke,
    /// Trauma centre.
    Trauma,
    /// Burns unit.
    Burns,
    /// Paediatric emergency department.
    Pediatric,
    /// General emergency department.
    General,
}

/// Operating status of a hospital emergency department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum HospitalStatus {
    /// Accepting patients.
    Open,
    /// Accepting only when nothing else is suitable.
    Diverting,
    /// Not accepting patients.
    Closed,
}

// ---------------------------------------------------------------------------
// Hazards
// ---------------------------------------------------------------------------

/// Kind of road hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum HazardType {
    /// Flooded roads.
    Flood,
    /// Traffic accident blocking lanes.
    Accident,
    /// Police or civil roadblock.
    Roadblock,
    /// Road works.
    Construction,
    /// Anything else.
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_is_legal() {
        let chain = [
            IncidentStatus::Pending,
            IncidentStatus::Assigned,
            IncidentStatus::Dispatched,
            IncidentStatus::EnRoute,
            IncidentStatus::Arrived,
            IncidentStatus::Transporting,
            IncidentStatus::Completed,
        ];
        for pair in chain.windows(2) {
            if let [from, to] = pair {
                assert!(from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn skipping_states_is_illegal() {
        assert!(!IncidentStatus::Pending.can_transition_to(IncidentStatus::Dispatched));
        assert!(!IncidentStatus::Assigned.can_transition_to(IncidentStatus::Arrived));
        assert!(!IncidentStatus::EnRoute.can_transition_to(IncidentStatus::Completed));
        assert!(!IncidentStatus::Transporting.can_transition_to(IncidentStatus::Arrived));
    }

    #[test]
    fn cancel_reachable_only_from_non_terminal() {
        assert!(IncidentStatus::Pending.can_transition_to(IncidentStatus::Cancelled));
        assert!(IncidentStatus::Transporting.can_transition_to(IncidentStatus::Cancelled));
        assert!(!IncidentStatus::Completed.can_transition_to(IncidentStatus::Cancelled));
        assert!(!IncidentStatus::Cancelled.can_transition_to(IncidentStatus::Cancelled));
    }

    #[test]
    fn holds_ambulance_matches_active_states() {
        assert!(!IncidentStatus::Pending.holds_ambulance());
        assert!(IncidentStatus::Assigned.holds_ambulance());
        assert!(IncidentStatus::Transporting.holds_ambulance());
        assert!(!IncidentStatus::Completed.holds_ambulance());
        assert!(!IncidentStatus::Cancelled.holds_ambulance());
    }

    #[test]
    fn wire_names() {
        let json = serde_json::to_string(&IncidentStatus::EnRoute).unwrap_or_default();
        assert_eq!(json, "\"EN_ROUTE\"");
        let json = serde_json::to_string(&TriageType::Stemi).unwrap_or_default();
        assert_eq!(json, "\"STEMI\"");
        let json = serde_json::to_string(&TriageType::Pediatric).unwrap_or_default();
        assert_eq!(json, "\"Pediatric\"");
        let json = serde_json::to_string(&HospitalCapability::Pci).unwrap_or_default();
        assert_eq!(json, "\"PCI\"");
    }

    #[test]
    fn capability_ordering() {
        assert!(AmbulanceType::Cct.satisfies(AmbulanceType::Als));
        assert!(AmbulanceType::Als.satisfies(AmbulanceType::Als));
        assert!(!AmbulanceType::Bls.satisfies(AmbulanceType::Als));
        assert!(!AmbulanceType::Rrv.satisfies(AmbulanceType::Bls));
    }
}
