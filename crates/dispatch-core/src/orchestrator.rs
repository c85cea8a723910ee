//! Dispatch orchestration: ranking, assignment, and simulation lifecycle.
//!
//! The orchestrator is the only component that starts or stops movement
//! simulations. It keeps a table of running simulations keyed by
//! incident, so that at most one exists per incident and a cancellation
//! can find and abort it.
//!
//! Automatic dispatch tries the ranked candidates in order. Losing the
//! race for one ambulance moves on to the next; losing the race for the
//! incident itself reports `AlreadyDispatched`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dispatch_types::{
    Ambulance, AmbulanceCandidate, AmbulanceId, AmbulanceType, DispatchResponse, GeoPoint,
    HospitalRecommendation, Incident, IncidentId, IncidentStatus, Phase, Route, Severity,
    SimulationInfo, SimulationStatus, TriageType,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::hospitals;
use crate::ranker::{CandidateRanker, RankRequest};
use crate::routing::RoutingOracle;
use crate::simulator::{DispatchPlan, MovementSimulator};
use crate::store::{EntityStore, NewIncident};

const CANCEL_REASON: &str = "cancelled by dispatcher";

/// Overrides for an automatic dispatch. Unset fields fall back to the
/// incident's own values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispatchOptions {
    /// Location to rank from.
    pub location: Option<GeoPoint>,
    /// Only this exact ambulance class is eligible.
    pub required_type: Option<AmbulanceType>,
    /// Triage used for class preference.
    pub triage: Option<TriageType>,
    /// Reported severity.
    pub severity: Option<Severity>,
}

/// A successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// The incident, now DISPATCHED.
    pub incident: Incident,
    /// The bound ambulance.
    pub ambulance: Ambulance,
    /// Route to the scene.
    pub route: Route,
}

impl DispatchOutcome {
    /// Wire form of the outcome.
    pub fn into_response(self) -> DispatchResponse {
        DispatchResponse {
            ambulance_id: self.ambulance.id,
            ambulance_callsign: self.ambulance.callsign,
            eta_seconds: self.route.eta_seconds,
            distance_meters: self.route.distance_meters,
            route: self.route.geometry,
            incident: self.incident,
        }
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOutcome {
    /// The incident was cancelled and its ambulance released.
    Cancelled,
    /// The incident had already completed; its ambulance's return leg was
    /// stopped where it was.
    ReturnLegStopped,
    /// Nothing was running and the incident was already terminal.
    NotActive,
}

struct SimulationHandle {
    generation: u64,
    ambulance_id: AmbulanceId,
    started_at: DateTime<Utc>,
    phase: watch::Receiver<Phase>,
    task: JoinHandle<()>,
}

type SimulationTable = Mutex<BTreeMap<IncidentId, SimulationHandle>>;

fn lock(table: &SimulationTable) -> MutexGuard<'_, BTreeMap<IncidentId, SimulationHandle>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coordinates the store, the ranker, and the movement simulator.
pub struct Orchestrator {
    store: Arc<EntityStore>,
    ranker: CandidateRanker,
    simulator: MovementSimulator,
    simulations: Arc<SimulationTable>,
    generation: AtomicU64,
    routing_timeout: Duration,
    assumed_speed_kmh: f64,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("oracle", &self.ranker.oracle().name())
            .field("active_simulations", &lock(&self.simulations).len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator over `store`, routing through `oracle`.
    pub fn new(store: Arc<EntityStore>, oracle: Arc<RoutingOracle>, config: &DispatchConfig) -> Self {
        let routing_timeout = config.dispatch.routing_timeout();
        let assumed_speed_kmh = config.dispatch.assumed_speed_kmh;
        Self {
            ranker: CandidateRanker::new(Arc::clone(&oracle), &config.dispatch),
            simulator: MovementSimulator::new(
                Arc::clone(&store),
                oracle,
                config.simulation.clone(),
                routing_timeout,
                assumed_speed_kmh,
            ),
            store,
            simulations: Arc::new(Mutex::new(BTreeMap::new())),
            generation: AtomicU64::new(0),
            routing_timeout,
            assumed_speed_kmh,
        }
    }

    /// The entity store.
    pub const fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// The routing oracle.
    pub const fn oracle(&self) -> &Arc<RoutingOracle> {
        self.ranker.oracle()
    }

    /// Deadline for a single routing call.
    pub const fn routing_timeout(&self) -> Duration {
        self.routing_timeout
    }

    // -----------------------------------------------------------------------
    // Incidents and hospitals
    // -----------------------------------------------------------------------

    /// Create an incident and record the best destination hospital on it.
    pub async fn create_incident(
        &self,
        new: NewIncident,
    ) -> Result<(Incident, Vec<HospitalRecommendation>), DispatchError> {
        let incident = self.store.create_incident(new).await?;
        let recommendations = self.recommend_for(&incident).await;
        let incident = match recommendations.first() {
            Some(best) => {
                self.store
                    .set_recommended_hospital(incident.id, best.hospital.id)
                    .await?
            }
            None => {
                warn!(incident_id = %incident.id, "no hospital accepting patients");
                incident
            }
        };
        Ok((incident, recommendations))
    }

    /// Destination hospitals for an incident, best first.
    pub async fn recommend_hospitals(
        &self,
        incident_id: IncidentId,
    ) -> Result<Vec<HospitalRecommendation>, DispatchError> {
        let incident = self.store.get_incident(incident_id).await?;
        Ok(self.recommend_for(&incident).await)
    }

    async fn recommend_for(&self, incident: &Incident) -> Vec<HospitalRecommendation> {
        let hospitals = self.store.list_hospitals().await;
        hospitals::recommend(
            &hospitals,
            incident.location,
            incident.triage,
            self.assumed_speed_kmh,
        )
    }

    /// Status change requested by a dispatcher.
    ///
    /// Incidents with a running simulation only accept `CANCELLED`, which
    /// goes through [`Orchestrator::cancel_simulation`].
    pub async fn update_incident_status(
        &self,
        incident_id: IncidentId,
        to: IncidentStatus,
    ) -> Result<Incident, DispatchError> {
        if to == IncidentStatus::Cancelled {
            let incident = self.store.get_incident(incident_id).await?;
            if incident.status.is_terminal() {
                return Err(DispatchError::InvalidTransition {
                    incident_id,
                    from: incident.status,
                    to,
                });
            }
            self.cancel_simulation(incident_id).await?;
            return self.store.get_incident(incident_id).await;
        }
        if self.has_simulation(incident_id) {
            return Err(DispatchError::Conflict(format!(
                "incident {incident_id} is driven by an active simulation"
            )));
        }
        self.store.update_incident_status(incident_id, to).await
    }

    // -----------------------------------------------------------------------
    // Ranking and dispatch
    // -----------------------------------------------------------------------

    /// Ranked candidates for an arbitrary location.
    pub async fn candidates(
        &self,
        location: GeoPoint,
        required_type: Option<AmbulanceType>,
        triage: Option<TriageType>,
    ) -> Vec<AmbulanceCandidate> {
        let request = RankRequest::new(location, required_type, triage, None);
        self.ranker.rank_from_store(&self.store, &request).await
    }

    /// Ranked candidates for an existing incident.
    pub async fn candidates_for_incident(
        &self,
        incident_id: IncidentId,
    ) -> Result<Vec<AmbulanceCandidate>, DispatchError> {
        let incident = self.store.get_incident(incident_id).await?;
        let request = RankRequest::new(
            incident.location,
            None,
            Some(incident.triage),
            incident.severity,
        );
        Ok(self.ranker.rank_from_store(&self.store, &request).await)
    }

    /// Pick the best available ambulance for a PENDING incident, bind it,
    /// and start its simulation.
    ///
    /// With no eligible candidate the incident stays PENDING and nothing
    /// is mutated.
    pub async fn dispatch(
        &self,
        incident_id: IncidentId,
        options: DispatchOptions,
    ) -> Result<DispatchOutcome, DispatchError> {
        let incident = self.store.get_incident(incident_id).await?;
        if incident.status.is_terminal() {
            return Err(DispatchError::IncidentNotAssignable {
                incident_id,
                status: incident.status,
            });
        }
        if incident.status != IncidentStatus::Pending || self.has_simulation(incident_id) {
            return Err(DispatchError::AlreadyDispatched { incident_id });
        }

        let request = RankRequest::new(
            options.location.unwrap_or(incident.location),
            options.required_type,
            options.triage.or(Some(incident.triage)),
            options.severity.or(incident.severity),
        );
        let candidates = self.ranker.rank_from_store(&self.store, &request).await;
        if candidates.is_empty() {
            warn!(%incident_id, "no ambulance available");
            return Err(DispatchError::NoCandidateAvailable { incident_id });
        }

        for candidate in candidates {
            let ambulance_id = candidate.ambulance.id;
            match self
                .store
                .assign_ambulance(incident_id, ambulance_id, None)
                .await
            {
                Ok((_, ambulance)) => {
                    info!(
                        %incident_id,
                        %ambulance_id,
                        eta_seconds = candidate.eta_seconds,
                        compatible = candidate.compatible,
                        "candidate selected"
                    );
                    return self.launch(incident_id, ambulance, candidate.route).await;
                }
                Err(DispatchError::AmbulanceUnavailable { .. }) => {
                    debug!(%incident_id, %ambulance_id, "candidate taken, trying next");
                }
                Err(DispatchError::IncidentNotAssignable { .. }) => {
                    return Err(DispatchError::AlreadyDispatched { incident_id });
                }
                Err(err) => return Err(err),
            }
        }

        warn!(%incident_id, "every candidate was claimed concurrently");
        Err(DispatchError::NoCandidateAvailable { incident_id })
    }

    /// Bind a specific ambulance chosen by a dispatcher and start its
    /// simulation.
    pub async fn assign_manual(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        notes: Option<String>,
    ) -> Result<DispatchOutcome, DispatchError> {
        if self.has_simulation(incident_id) {
            return Err(DispatchError::AlreadyDispatched { incident_id });
        }
        let (incident, ambulance) = self
            .store
            .assign_ambulance(incident_id, ambulance_id, notes)
            .await?;
        let route = self
            .oracle()
            .route_or_estimate(ambulance.location, incident.location, self.routing_timeout)
            .await;
        self.launch(incident_id, ambulance, route).await
    }

    async fn launch(
        &self,
        incident_id: IncidentId,
        ambulance: Ambulance,
        route: Route,
    ) -> Result<DispatchOutcome, DispatchError> {
        let incident = self
            .store
            .dispatch_incident(incident_id, ambulance.id, route.eta_seconds)
            .await?;
        self.start_simulation(DispatchPlan {
            incident_id,
            ambulance_id: ambulance.id,
            route: route.clone(),
        });
        Ok(DispatchOutcome {
            incident,
            ambulance,
            route,
        })
    }

    // -----------------------------------------------------------------------
    // Simulations
    // -----------------------------------------------------------------------

    fn start_simulation(&self, plan: DispatchPlan) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (incident_id, ambulance_id) = (plan.incident_id, plan.ambulance_id);
        let (phase_tx, phase_rx) = watch::channel(Phase::ToScene);
        let simulator = self.simulator.clone();
        let simulations = Arc::clone(&self.simulations);

        let mut table = lock(&self.simulations);
        let task = tokio::spawn(async move {
            let outcome = simulator.run(plan, phase_tx).await;
            debug!(%incident_id, ?outcome, "simulation finished");
            let mut table = lock(&simulations);
            if table
                .get(&incident_id)
                .is_some_and(|handle| handle.generation == generation)
            {
                table.remove(&incident_id);
            }
        });
        table.insert(
            incident_id,
            SimulationHandle {
                generation,
                ambulance_id,
                started_at: Utc::now(),
                phase: phase_rx,
                task,
            },
        );
        info!(%incident_id, %ambulance_id, "simulation started");
    }

    fn has_simulation(&self, incident_id: IncidentId) -> bool {
        lock(&self.simulations).contains_key(&incident_id)
    }

    /// Stop an incident's simulation and cancel the incident if it is
    /// still live. Calling it again is a no-op that reports
    /// [`CancelOutcome::NotActive`].
    pub async fn cancel_simulation(
        &self,
        incident_id: IncidentId,
    ) -> Result<CancelOutcome, DispatchError> {
        let phase = lock(&self.simulations).remove(&incident_id).map(|handle| {
            handle.task.abort();
            *handle.phase.borrow()
        });

        let incident = self.store.get_incident(incident_id).await?;
        if incident.status.is_terminal() {
            if phase == Some(Phase::Returning) {
                info!(%incident_id, "return leg stopped");
                return Ok(CancelOutcome::ReturnLegStopped);
            }
            return Ok(CancelOutcome::NotActive);
        }

        match self.store.cancel_incident(incident_id, CANCEL_REASON).await {
            Ok(_) => Ok(CancelOutcome::Cancelled),
            // Completed between the read and the cancel.
            Err(DispatchError::InvalidTransition { .. }) => Ok(CancelOutcome::NotActive),
            Err(err) => Err(err),
        }
    }

    /// Cancel every running simulation. Returns how many were stopped.
    pub async fn cancel_all(&self) -> usize {
        let ids: Vec<IncidentId> = lock(&self.simulations).keys().copied().collect();
        let mut stopped = 0_usize;
        for incident_id in ids {
            match self.cancel_simulation(incident_id).await {
                Ok(CancelOutcome::Cancelled | CancelOutcome::ReturnLegStopped) => {
                    stopped = stopped.saturating_add(1);
                }
                Ok(CancelOutcome::NotActive) => {}
                Err(err) => warn!(%incident_id, error = %err, "cancel failed"),
            }
        }
        info!(stopped, "all simulations cancelled");
        stopped
    }

    /// Running simulations, by incident.
    pub fn status(&self) -> SimulationStatus {
        let table = lock(&self.simulations);
        let incidents: Vec<SimulationInfo> = table
            .iter()
            .map(|(incident_id, handle)| SimulationInfo {
                incident_id: *incident_id,
                ambulance_id: handle.ambulance_id,
                phase: *handle.phase.borrow(),
                started_at: handle.started_at,
            })
            .collect();
        SimulationStatus {
            active_simulations: u32::try_from(incidents.len()).unwrap_or(u32::MAX),
            incidents,
        }
    }

    /// Abort every simulation task without touching the store.
    pub fn shutdown(&self) {
        let mut table = lock(&self.simulations);
        let count = table.len();
        for (_, handle) in std::mem::take(&mut *table) {
            handle.task.abort();
        }
        info!(count, "simulations aborted");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dispatch_events::{DispatchEvent, EventBus, EventEnvelope};
    use dispatch_types::{AmbulanceStatus, Hospital, HospitalCapability, HospitalId, HospitalStatus};
    use tokio::sync::broadcast;

    use super::*;
    use crate::geo;
    use crate::scenario;

    const SCENE: GeoPoint = GeoPoint::new(3.1390, 101.6869);

    fn fast_config() -> DispatchConfig {
        let mut config = DispatchConfig::default();
        config.simulation.time_scale = 10.0;
        config
    }

    async fn seeded(config: &DispatchConfig) -> Orchestrator {
        let store = Arc::new(EntityStore::new(EventBus::new(16_384)));
        scenario::seed_store(&store).await;
        let oracle = Arc::new(RoutingOracle::straight_line(
            config.dispatch.assumed_speed_kmh,
        ));
        Orchestrator::new(store, oracle, config)
    }

    fn drain(rx: &mut broadcast::Receiver<Arc<EventEnvelope>>) -> Vec<Arc<EventEnvelope>> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope);
        }
        events
    }

    fn statuses_for(events: &[Arc<EventEnvelope>], id: IncidentId) -> Vec<IncidentStatus> {
        let mut statuses: Vec<IncidentStatus> = Vec::new();
        for envelope in events {
            if let DispatchEvent::IncidentUpdate(incident) = &envelope.event {
                if incident.id == id && statuses.last() != Some(&incident.status) {
                    statuses.push(incident.status);
                }
            }
        }
        statuses
    }

    #[tokio::test(start_paused = true)]
    async fn stemi_dispatch_runs_to_completion_and_returns_home() {
        let orchestrator = seeded(&fast_config()).await;
        let store = Arc::clone(orchestrator.store());
        let mut rx = store.bus().subscribe();

        let (incident, recommendations) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Stemi))
            .await
            .unwrap();
        assert!(!recommendations.is_empty());
        let hospital_id = incident.recommended_hospital_id.unwrap();

        let outcome = orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();
        assert!(outcome.ambulance.ambulance_type.satisfies(AmbulanceType::Als));
        assert!(geo::haversine_meters(outcome.ambulance.location, SCENE) < 5_000.0);
        assert_eq!(outcome.incident.status, IncidentStatus::Dispatched);
        assert_eq!(orchestrator.status().active_simulations, 1);

        tokio::time::sleep(Duration::from_secs(3_600)).await;

        let done = store.get_incident(incident.id).await.unwrap();
        assert_eq!(done.status, IncidentStatus::Completed);
        assert_eq!(done.assigned_ambulance_id, None);

        let ambulance = store.get_ambulance(outcome.ambulance.id).await.unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Idle);
        let home = store
            .get_hospital(ambulance.hospital_id.unwrap())
            .await
            .unwrap();
        assert!(geo::haversine_meters(ambulance.location, home.location) < 1.0);
        assert_eq!(orchestrator.status().active_simulations, 0);

        let events = drain(&mut rx);
        assert_eq!(
            statuses_for(&events, incident.id),
            vec![
                IncidentStatus::Pending,
                IncidentStatus::Assigned,
                IncidentStatus::Dispatched,
                IncidentStatus::EnRoute,
                IncidentStatus::Arrived,
                IncidentStatus::Transporting,
                IncidentStatus::Completed,
            ]
        );
        assert!(events.iter().any(|e| matches!(
            &e.event,
            DispatchEvent::HospitalSelected(selected) if selected.hospital_id == hospital_id
        )));
        assert!(events.iter().any(|e| matches!(
            &e.event,
            DispatchEvent::SimulationComplete(complete) if complete.incident_id == incident.id
        )));
        assert!(events.windows(2).all(|pair| match pair {
            [a, b] => a.seq < b.seq,
            _ => true,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_eta_strictly_decreases_per_leg() {
        let orchestrator = seeded(&fast_config()).await;
        let mut rx = orchestrator.store().bus().subscribe();
        // PCI centres are away from the dispatching unit's home base, so
        // all three legs are driven.
        let (incident, _) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Stemi))
            .await
            .unwrap();
        orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(3_600)).await;
        let events = drain(&mut rx);

        for phase in [Phase::ToScene, Phase::ToHospital, Phase::Returning] {
            let etas: Vec<u32> = events
                .iter()
                .filter_map(|e| match &e.event {
                    DispatchEvent::AmbulanceUpdate(update) if update.phase == Some(phase) => {
                        update.eta_seconds
                    }
                    _ => None,
                })
                .collect();
            assert!(etas.len() > 1, "{phase:?} produced {} ticks", etas.len());
            assert!(
                etas.windows(2).all(|pair| match pair {
                    [a, b] => b < a,
                    _ => true,
                }),
                "{phase:?} etas {etas:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_mid_trip_matches_live_stream() {
        let orchestrator = seeded(&DispatchConfig::default()).await;
        let store = Arc::clone(orchestrator.store());
        let mut rx = store.bus().subscribe();
        let (incident, _) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Stroke))
            .await
            .unwrap();
        let outcome = orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();
        let dispatched_eta = outcome.incident.eta_seconds.unwrap();
        assert!(dispatched_eta > 120, "eta {dispatched_eta}");

        tokio::time::sleep(Duration::from_secs(60)).await;

        // A session reconnecting now.
        let (_session, snapshot) = store.subscribe_with_snapshot().await;
        let last_tick = drain(&mut rx)
            .iter()
            .rev()
            .filter(|e| e.seq <= snapshot.seq)
            .find_map(|e| match &e.event {
                DispatchEvent::AmbulanceUpdate(update)
                    if update.ambulance.id == outcome.ambulance.id =>
                {
                    update.phase.zip(update.eta_seconds)
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(last_tick.0, Phase::ToScene);
        assert!(last_tick.1 < dispatched_eta);

        let current = snapshot
            .incidents
            .iter()
            .find(|i| i.id == incident.id)
            .unwrap();
        assert_eq!(current.status, IncidentStatus::EnRoute);
        assert_eq!(current.eta_seconds, Some(last_tick.1));

        let motion = snapshot
            .motions
            .iter()
            .find(|m| m.ambulance_id == outcome.ambulance.id)
            .unwrap();
        assert_eq!(motion.incident_id, incident.id);
        assert_eq!(motion.phase, last_tick.0);
        assert_eq!(motion.eta_seconds, last_tick.1);

        orchestrator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn minor_general_case_completes_at_scene() {
        let orchestrator = seeded(&fast_config()).await;
        let store = Arc::clone(orchestrator.store());
        let mut new = NewIncident::new(SCENE, TriageType::General);
        new.severity = Some(Severity::Low);
        let (incident, _) = orchestrator.create_incident(new).await.unwrap();
        let mut rx = store.bus().subscribe();

        orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3_600)).await;

        let statuses = statuses_for(&drain(&mut rx), incident.id);
        assert!(!statuses.contains(&IncidentStatus::Transporting));
        assert_eq!(statuses.last(), Some(&IncidentStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_a_lower_class_when_no_preferred_unit_is_idle() {
        let store = Arc::new(EntityStore::new(EventBus::new(4_096)));
        let now = Utc::now();
        store
            .insert_hospital(Hospital {
                id: HospitalId(1),
                name: "Hospital Kuala Lumpur".to_owned(),
                location: GeoPoint::new(3.1717, 101.7012),
                capabilities: vec![HospitalCapability::General, HospitalCapability::Pci],
                status: HospitalStatus::Open,
                load: 30,
                ambulance_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await;
        for (id, lat) in [(1, 3.15), (2, 3.16)] {
            store
                .insert_ambulance(Ambulance {
                    id: AmbulanceId(id),
                    callsign: format!("BRAVO-{id}"),
                    ambulance_type: AmbulanceType::Bls,
                    status: AmbulanceStatus::Idle,
                    location: GeoPoint::new(lat, 101.69),
                    hospital_id: Some(HospitalId(1)),
                    updated_at: now,
                })
                .await;
        }
        let config = fast_config();
        let oracle = Arc::new(RoutingOracle::straight_line(40.0));
        let orchestrator = Orchestrator::new(Arc::clone(&store), oracle, &config);

        let (incident, _) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Stemi))
            .await
            .unwrap();
        let candidates = orchestrator
            .candidates_for_incident(incident.id)
            .await
            .unwrap();
        assert!(candidates.iter().all(|c| !c.compatible));

        let outcome = orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.ambulance.id, AmbulanceId(1));
        assert_eq!(outcome.ambulance.ambulance_type, AmbulanceType::Bls);
        orchestrator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_route_releases_in_place_and_silences_ticks() {
        let mut config = DispatchConfig::default();
        config.simulation.time_scale = 1.0;
        let orchestrator = seeded(&config).await;
        let store = Arc::clone(orchestrator.store());

        let (incident, _) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Stroke))
            .await
            .unwrap();
        let outcome = orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();
        let start = outcome.ambulance.location;

        tokio::time::sleep(Duration::from_secs(60)).await;
        let mut rx = store.bus().subscribe();

        let result = orchestrator.cancel_simulation(incident.id).await.unwrap();
        assert_eq!(result, CancelOutcome::Cancelled);

        let cancelled = store.get_incident(incident.id).await.unwrap();
        assert_eq!(cancelled.status, IncidentStatus::Cancelled);
        let ambulance = store.get_ambulance(outcome.ambulance.id).await.unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Idle);
        assert!(geo::haversine_meters(ambulance.location, start) > 10.0);
        assert!(geo::haversine_meters(ambulance.location, SCENE) > 10.0);

        tokio::time::sleep(Duration::from_secs(600)).await;
        let events = drain(&mut rx);
        let cancel_at = events
            .iter()
            .position(|e| matches!(e.event, DispatchEvent::SimulationCancelled(_)))
            .unwrap();
        assert!(events.iter().skip(cancel_at).all(|e| !matches!(
            &e.event,
            DispatchEvent::AmbulanceUpdate(update)
                if update.incident_id == Some(incident.id) && update.phase.is_some()
        )));

        let again = orchestrator.cancel_simulation(incident.id).await.unwrap();
        assert_eq!(again, CancelOutcome::NotActive);
        assert_eq!(orchestrator.status().active_simulations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_candidate_leaves_incident_pending() {
        let store = Arc::new(EntityStore::new(EventBus::new(256)));
        let config = fast_config();
        let oracle = Arc::new(RoutingOracle::straight_line(40.0));
        let orchestrator = Orchestrator::new(Arc::clone(&store), oracle, &config);
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::Trauma))
            .await
            .unwrap();
        let seq = store.bus().current_seq();

        let err = orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::NoCandidateAvailable {
                incident_id: incident.id
            }
        );
        assert_eq!(
            store.get_incident(incident.id).await.unwrap().status,
            IncidentStatus::Pending
        );
        assert_eq!(store.bus().current_seq(), seq);
    }

    #[tokio::test(start_paused = true)]
    async fn second_dispatch_of_the_same_incident_is_rejected() {
        let orchestrator = seeded(&fast_config()).await;
        let (incident, _) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Trauma))
            .await
            .unwrap();
        orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();
        let err = orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::AlreadyDispatched { incident_id: incident.id });
        assert_eq!(orchestrator.status().active_simulations, 1);
        orchestrator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn manual_assignment_runs_the_same_lifecycle() {
        let orchestrator = seeded(&fast_config()).await;
        let store = Arc::clone(orchestrator.store());
        let (incident, _) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Burns))
            .await
            .unwrap();

        let outcome = orchestrator
            .assign_manual(incident.id, AmbulanceId(4), Some("closest crew".to_owned()))
            .await
            .unwrap();
        assert_eq!(outcome.incident.status, IncidentStatus::Dispatched);
        assert_eq!(outcome.incident.dispatcher_notes.as_deref(), Some("closest crew"));

        let err = orchestrator
            .update_incident_status(incident.id, IncidentStatus::Arrived)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));

        tokio::time::sleep(Duration::from_secs(3_600)).await;
        assert_eq!(
            store.get_incident(incident.id).await.unwrap().status,
            IncidentStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_through_status_update_stops_the_simulation() {
        let orchestrator = seeded(&fast_config()).await;
        let (incident, _) = orchestrator
            .create_incident(NewIncident::new(SCENE, TriageType::Pediatric))
            .await
            .unwrap();
        orchestrator
            .dispatch(incident.id, DispatchOptions::default())
            .await
            .unwrap();

        let cancelled = orchestrator
            .update_incident_status(incident.id, IncidentStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, IncidentStatus::Cancelled);
        assert_eq!(orchestrator.status().active_simulations, 0);

        let err = orchestrator
            .update_incident_status(incident.id, IncidentStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn returning_ambulance_can_be_claimed_again() {
        let orchestrator = seeded(&fast_config()).await;
        let store = Arc::clone(orchestrator.store());
        let mut new = NewIncident::new(SCENE, TriageType::General);
        new.severity = Some(Severity::Low);
        let (first, _) = orchestrator.create_incident(new).await.unwrap();
        let outcome = orchestrator
            .assign_manual(first.id, AmbulanceId(1), None)
            .await
            .unwrap();

        // Wait for completion but not for the return leg to finish.
        let mut phase = Phase::ToScene;
        for _ in 0..600 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Some(info) = orchestrator.status().incidents.first() {
                phase = info.phase;
            }
            if phase == Phase::Returning {
                break;
            }
        }
        assert_eq!(phase, Phase::Returning);
        assert_eq!(
            store.get_ambulance(outcome.ambulance.id).await.unwrap().status,
            AmbulanceStatus::Idle
        );

        let (second, _) = orchestrator
            .create_incident(NewIncident::new(GeoPoint::new(3.16, 101.70), TriageType::Trauma))
            .await
            .unwrap();
        orchestrator
            .assign_manual(second.id, outcome.ambulance.id, None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let statuses: Vec<IncidentId> = orchestrator
            .status()
            .incidents
            .iter()
            .map(|info| info.incident_id)
            .collect();
        assert_eq!(statuses, vec![second.id]);
        orchestrator.shutdown();
    }
}
