//! Domain error taxonomy for dispatch operations.
//!
//! Every entity-store invariant violation is rejected synchronously with
//! one of these variants; the state is left unchanged. Upstream failures
//! (routing oracle, triage classifier) are absorbed with a fallback
//! wherever one exists and only surface as [`DispatchError::UpstreamUnavailable`]
//! when none does.

use dispatch_types::{
    AmbulanceId, AmbulanceStatus, HazardId, HospitalId, IncidentId, IncidentStatus,
};

/// Errors returned by the entity store and the dispatch orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No incident with this id exists.
    #[error("incident {0} not found")]
    IncidentNotFound(IncidentId),

    /// No ambulance with this id exists.
    #[error("ambulance {0} not found")]
    AmbulanceNotFound(AmbulanceId),

    /// No hospital with this id exists.
    #[error("hospital {0} not found")]
    HospitalNotFound(HospitalId),

    /// No hazard with this id exists.
    #[error("hazard {0} not found")]
    HazardNotFound(HazardId),

    /// The requested status change is not an edge of the incident graph.
    #[error("incident {incident_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The incident.
        incident_id: IncidentId,
        /// Current status.
        from: IncidentStatus,
        /// Requested status.
        to: IncidentStatus,
    },

    /// The ambulance is not IDLE.
    #[error("ambulance {ambulance_id} is unavailable ({status})")]
    AmbulanceUnavailable {
        /// The ambulance.
        ambulance_id: AmbulanceId,
        /// Its status at the time of the request.
        status: AmbulanceStatus,
    },

    /// The incident is not PENDING.
    #[error("incident {incident_id} is not assignable ({status})")]
    IncidentNotAssignable {
        /// The incident.
        incident_id: IncidentId,
        /// Its status at the time of the request.
        status: IncidentStatus,
    },

    /// Ranking produced no eligible ambulance. The incident stays PENDING.
    #[error("no ambulance available for incident {incident_id}")]
    NoCandidateAvailable {
        /// The incident.
        incident_id: IncidentId,
    },

    /// The incident already has an ambulance or a running simulation.
    #[error("incident {incident_id} is already dispatched")]
    AlreadyDispatched {
        /// The incident.
        incident_id: IncidentId,
    },

    /// Lost a race for a shared resource; the caller may retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A collaborator failed and no fallback exists.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DispatchError {
    /// Stable machine-readable tag for the error.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::IncidentNotFound(_)
            | Self::AmbulanceNotFound(_)
            | Self::HospitalNotFound(_)
            | Self::HazardNotFound(_) => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AmbulanceUnavailable { .. } => "AMBULANCE_UNAVAILABLE",
            Self::IncidentNotAssignable { .. } => "INCIDENT_NOT_ASSIGNABLE",
            Self::NoCandidateAvailable { .. } => "NO_CANDIDATE_AVAILABLE",
            Self::AlreadyDispatched { .. } => "ALREADY_DISPATCHED",
            Self::Conflict(_) => "CONFLICT",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Whether the error reports a missing entity.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::IncidentNotFound(_)
                | Self::AmbulanceNotFound(_)
                | Self::HospitalNotFound(_)
                | Self::HazardNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let err = DispatchError::InvalidTransition {
            incident_id: IncidentId::new(),
            from: IncidentStatus::Pending,
            to: IncidentStatus::Completed,
        };
        assert_eq!(err.kind(), "INVALID_TRANSITION");
        assert!(err.to_string().contains("PENDING"));

        let err = DispatchError::AmbulanceNotFound(AmbulanceId(9));
        assert_eq!(err.kind(), "NOT_FOUND");
        assert!(err.is_not_found());
    }
}
