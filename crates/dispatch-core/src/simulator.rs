//! Movement simulation for one dispatch.
//!
//! A simulation walks its incident through the back half of the state
//! graph while animating the ambulance:
//!
//! | Phase         | Movement                  | Ends with                          |
//! |---------------|---------------------------|------------------------------------|
//! | `TO_SCENE`    | current position -> scene | `ARRIVED`, on-scene dwell          |
//! | `TO_HOSPITAL` | scene -> hospital         | `COMPLETED`, ambulance IDLE        |
//! | `RETURNING`   | drop-off -> home hospital | final position report, teardown    |
//!
//! Transport is skipped for low-severity general cases; the incident then
//! goes `ARRIVED -> COMPLETED` at the scene.
//!
//! Position on a leg is the point at `elapsed * time_scale / eta` of the
//! route length, recomputed on every tick. Every write goes through the
//! [`EntityStore`], which rejects writes from a simulation whose pairing
//! was cancelled; the simulation treats that rejection as its stop signal.

use std::sync::Arc;
use std::time::Duration;

use dispatch_types::{
    AmbulanceId, GeoPoint, Hospital, HospitalStatus, IncidentId, Phase, Route, Severity,
    TriageType,
};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::DispatchError;
use crate::geo::{self, Polyline};
use crate::hospitals;
use crate::routing::RoutingOracle;
use crate::store::EntityStore;

/// Whether a patient must be carried to hospital. Only low-severity
/// general cases are treated and released at the scene.
pub fn requires_transport(triage: TriageType, severity: Option<Severity>) -> bool {
    triage != TriageType::General || severity == Some(Severity::High)
}

/// A bound (incident, ambulance) pair and the route to the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    /// The incident being served.
    pub incident_id: IncidentId,
    /// The ambulance bound to it.
    pub ambulance_id: AmbulanceId,
    /// Route from the ambulance to the scene.
    pub route: Route,
}

/// How a simulation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// The incident reached COMPLETED.
    Completed,
    /// A store write was rejected, normally because the dispatch was
    /// cancelled.
    Interrupted(DispatchError),
}

/// Drives dispatch plans to completion.
#[derive(Debug, Clone)]
pub struct MovementSimulator {
    store: Arc<EntityStore>,
    oracle: Arc<RoutingOracle>,
    config: SimulationConfig,
    routing_timeout: Duration,
    assumed_speed_kmh: f64,
}

impl MovementSimulator {
    /// Create a simulator writing to `store`.
    pub const fn new(
        store: Arc<EntityStore>,
        oracle: Arc<RoutingOracle>,
        config: SimulationConfig,
        routing_timeout: Duration,
        assumed_speed_kmh: f64,
    ) -> Self {
        Self {
            store,
            oracle,
            config,
            routing_timeout,
            assumed_speed_kmh,
        }
    }

    /// Run `plan` to the end, publishing the current phase on `phase`.
    ///
    /// The incident must be DISPATCHED with the plan's ambulance bound.
    pub async fn run(&self, plan: DispatchPlan, phase: watch::Sender<Phase>) -> SimulationOutcome {
        match self.serve(&plan, &phase).await {
            Ok(()) => SimulationOutcome::Completed,
            Err(err) => {
                debug!(
                    incident_id = %plan.incident_id,
                    ambulance_id = %plan.ambulance_id,
                    error = %err,
                    "simulation stopped"
                );
                SimulationOutcome::Interrupted(err)
            }
        }
    }

    async fn serve(
        &self,
        plan: &DispatchPlan,
        phase: &watch::Sender<Phase>,
    ) -> Result<(), DispatchError> {
        let (incident_id, ambulance_id) = (plan.incident_id, plan.ambulance_id);
        let start = self.store.get_ambulance(ambulance_id).await?.location;

        let incident = self
            .store
            .depart(incident_id, ambulance_id, plan.route.eta_seconds)
            .await?;
        info!(%incident_id, %ambulance_id, eta_seconds = plan.route.eta_seconds, "en route to scene");

        self.drive(plan, Phase::ToScene, &plan.route, start).await?;
        self.store.arrive_on_scene(incident_id, ambulance_id).await?;
        self.dwell().await;

        let scene = incident.location;
        let destination = if requires_transport(incident.triage, incident.severity) {
            self.destination(incident_id, incident.triage, scene).await?
        } else {
            None
        };

        let drop_off = match destination {
            Some(hospital) => {
                phase.send_replace(Phase::ToHospital);
                let route = self
                    .oracle
                    .route_or_estimate(scene, hospital.location, self.routing_timeout)
                    .await;
                self.store
                    .begin_transport(incident_id, ambulance_id, hospital.id, route.eta_seconds)
                    .await?;
                self.drive(plan, Phase::ToHospital, &route, scene).await?;
                hospital.location
            }
            None => scene,
        };

        self.store
            .complete_incident(incident_id, ambulance_id, drop_off)
            .await?;

        phase.send_replace(Phase::Returning);
        match self.return_home(plan, drop_off).await {
            Ok(()) | Err(DispatchError::Conflict(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Move along `route`, reporting one position per tick, until the
    /// leg's ETA has elapsed in simulated time. Returns the end point.
    async fn drive(
        &self,
        plan: &DispatchPlan,
        phase: Phase,
        route: &Route,
        origin: GeoPoint,
    ) -> Result<GeoPoint, DispatchError> {
        let line = Polyline::new(route.geometry.points(), origin);
        let end = line.end().unwrap_or(origin);
        if route.eta_seconds == 0 {
            return Ok(end);
        }

        let total = f64::from(route.eta_seconds);
        let started = Instant::now();
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let elapsed = started.elapsed().as_secs_f64() * self.config.time_scale;
            if elapsed >= total {
                return Ok(end);
            }
            let position = line.point_at(elapsed / total).unwrap_or(end);
            let remaining = geo::seconds_from_f64(total - elapsed);
            self.report(plan, phase, position, remaining).await?;
        }
    }

    async fn report(
        &self,
        plan: &DispatchPlan,
        phase: Phase,
        position: GeoPoint,
        remaining: u32,
    ) -> Result<(), DispatchError> {
        match phase {
            Phase::Returning => {
                self.store
                    .record_return_movement(plan.incident_id, plan.ambulance_id, position, remaining)
                    .await?;
            }
            Phase::ToScene | Phase::ToHospital => {
                self.store
                    .record_movement(plan.incident_id, plan.ambulance_id, position, phase, remaining)
                    .await?;
            }
        }
        Ok(())
    }

    /// Simulated on-scene time.
    async fn dwell(&self) {
        let seconds = f64::from(self.config.on_scene_seconds) / self.config.time_scale;
        if seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        }
    }

    /// The recommended hospital if it is still accepting, otherwise a
    /// fresh recommendation (recorded on the incident).
    async fn destination(
        &self,
        incident_id: IncidentId,
        triage: TriageType,
        scene: GeoPoint,
    ) -> Result<Option<Hospital>, DispatchError> {
        let incident = self.store.get_incident(incident_id).await?;
        if let Some(hospital_id) = incident.recommended_hospital_id {
            if let Ok(hospital) = self.store.get_hospital(hospital_id).await {
                if hospital.status != HospitalStatus::Closed {
                    return Ok(Some(hospital));
                }
            }
        }

        let hospitals = self.store.list_hospitals().await;
        let best = hospitals::recommend(&hospitals, scene, triage, self.assumed_speed_kmh)
            .into_iter()
            .next();
        if let Some(recommendation) = &best {
            self.store
                .set_recommended_hospital(incident_id, recommendation.hospital.id)
                .await?;
        }
        Ok(best.map(|r| r.hospital))
    }

    /// Drive the released ambulance back to its home hospital. Stops with
    /// `Conflict` as soon as another dispatch claims it.
    async fn return_home(&self, plan: &DispatchPlan, from: GeoPoint) -> Result<(), DispatchError> {
        let ambulance = self.store.get_ambulance(plan.ambulance_id).await?;
        let Some(home_id) = ambulance.hospital_id else {
            return Ok(());
        };
        let home = self.store.get_hospital(home_id).await?.location;
        if geo::haversine_meters(from, home) < 1.0 {
            return Ok(());
        }

        let route = self
            .oracle
            .route_or_estimate(from, home, self.routing_timeout)
            .await;
        let end = self.drive(plan, Phase::Returning, &route, from).await?;
        self.store
            .record_return_movement(plan.incident_id, plan.ambulance_id, end, 0)
            .await?;
        info!(
            incident_id = %plan.incident_id,
            ambulance_id = %plan.ambulance_id,
            "ambulance back at home hospital"
        );
        Ok(())
    }
}
