//! Candidate ranking.
//!
//! 1. Keep IDLE ambulances (exact type match when a type is required).
//! 2. Order by compatibility with the preferred class, then great-circle
//!    distance, then id, and keep the first `candidate_top_k`.
//! 3. Route those candidates concurrently, each call under the routing
//!    timeout with a straight-line fallback.
//! 4. Add the hazard penalty for every active hazard the route crosses.
//! 5. Order by compatibility, ETA, route distance, id.
//!
//! The oracle is called at most `candidate_top_k` times per ranking.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dispatch_types::{
    Ambulance, AmbulanceCandidate, AmbulanceStatus, AmbulanceType, GeoPoint, Hazard, Route,
    Severity, TriageType,
};
use futures::future::join_all;
use tracing::debug;

use crate::config::RankingConfig;
use crate::geo;
use crate::routing::RoutingOracle;
use crate::store::EntityStore;

/// What to rank candidates for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankRequest {
    /// Incident location.
    pub location: GeoPoint,
    /// Only this exact class is eligible.
    pub required_type: Option<AmbulanceType>,
    /// Classes at or above this rank sort first.
    pub preferred_type: Option<AmbulanceType>,
    /// Reported severity. Recorded for logging; it does not preempt.
    pub severity: Option<Severity>,
}

impl RankRequest {
    /// Request for `location` with the class preference implied by
    /// `triage`, unless an exact `required_type` is given.
    pub fn new(
        location: GeoPoint,
        required_type: Option<AmbulanceType>,
        triage: Option<TriageType>,
        severity: Option<Severity>,
    ) -> Self {
        Self {
            location,
            required_type,
            preferred_type: required_type.or_else(|| triage.map(TriageType::preferred_ambulance)),
            severity,
        }
    }

    fn compatible(&self, ambulance_type: AmbulanceType) -> bool {
        self.preferred_type
            .is_none_or(|preferred| ambulance_type.satisfies(preferred))
    }
}

/// Ranks ambulances for an incident.
#[derive(Debug)]
pub struct CandidateRanker {
    oracle: Arc<RoutingOracle>,
    top_k: usize,
    routing_timeout: Duration,
    hazard_penalty_seconds: u32,
}

impl CandidateRanker {
    /// Create a ranker over `oracle`.
    pub fn new(oracle: Arc<RoutingOracle>, config: &RankingConfig) -> Self {
        Self {
            oracle,
            top_k: config.candidate_top_k.max(1),
            routing_timeout: config.routing_timeout(),
            hazard_penalty_seconds: config.hazard_penalty_seconds,
        }
    }

    /// The routing oracle used for candidates.
    pub const fn oracle(&self) -> &Arc<RoutingOracle> {
        &self.oracle
    }

    /// Rank the store's current IDLE ambulances, applying active hazards.
    pub async fn rank_from_store(
        &self,
        store: &EntityStore,
        request: &RankRequest,
    ) -> Vec<AmbulanceCandidate> {
        let ambulances = store.list_ambulances(true).await;
        let hazards = store.active_hazards().await;
        self.rank(ambulances, &hazards, request).await
    }

    /// Rank `ambulances`. Returns an empty list when none is eligible.
    pub async fn rank(
        &self,
        ambulances: Vec<Ambulance>,
        hazards: &[Hazard],
        request: &RankRequest,
    ) -> Vec<AmbulanceCandidate> {
        let mut eligible: Vec<(Ambulance, f64, bool)> = ambulances
            .into_iter()
            .filter(|a| a.status == AmbulanceStatus::Idle)
            .filter(|a| {
                request
                    .required_type
                    .is_none_or(|required| a.ambulance_type == required)
            })
            .map(|a| {
                let distance = geo::haversine_meters(a.location, request.location);
                let compatible = request.compatible(a.ambulance_type);
                (a, distance, compatible)
            })
            .collect();

        eligible.sort_by(|(a, da, ca), (b, db, cb)| {
            cb.cmp(ca)
                .then(da.partial_cmp(db).unwrap_or(Ordering::Equal))
                .then(a.id.cmp(&b.id))
        });
        eligible.truncate(self.top_k);

        let routes = join_all(eligible.iter().map(|(ambulance, _, _)| {
            self.oracle
                .route_or_estimate(ambulance.location, request.location, self.routing_timeout)
        }))
        .await;

        let mut candidates: Vec<AmbulanceCandidate> = eligible
            .into_iter()
            .zip(routes)
            .map(|((ambulance, straight_line, compatible), route)| {
                let penalty = self.hazard_penalty(&route, hazards);
                AmbulanceCandidate {
                    eta_seconds: route.eta_seconds.saturating_add(penalty),
                    distance_meters: route.distance_meters,
                    straight_line_meters: straight_line,
                    compatible,
                    route,
                    ambulance,
                }
            })
            .collect();

        candidates.sort_by(compare_candidates);
        debug!(
            candidates = candidates.len(),
            preferred = ?request.preferred_type,
            severity = ?request.severity,
            "ranking complete"
        );
        candidates
    }

    fn hazard_penalty(&self, route: &Route, hazards: &[Hazard]) -> u32 {
        let points = route.geometry.points();
        let crossed = hazards
            .iter()
            .filter(|h| h.active && points.iter().any(|p| h.bounds.contains(*p)))
            .count();
        u32::try_from(crossed)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.hazard_penalty_seconds)
    }
}

/// Compatible first, then ETA, route distance, and id ascending.
fn compare_candidates(a: &AmbulanceCandidate, b: &AmbulanceCandidate) -> Ordering {
    b.compatible
        .cmp(&a.compatible)
        .then(a.eta_seconds.cmp(&b.eta_seconds))
        .then(
            a.distance_meters
                .partial_cmp(&b.distance_meters)
                .unwrap_or(Ordering::Equal),
        )
        .then(a.ambulance.id.cmp(&b.ambulance.id))
}
