//! Authoritative entity store.
//!
//! All incidents, ambulances, hospitals, and hazards live in one set of
//! tables behind a single [`RwLock`]. Every mutation:
//!
//! 1. takes the write lock,
//! 2. validates against the current state and either rejects with a
//!    specific [`DispatchError`] (state unchanged) or applies the change,
//! 3. publishes the resulting events on the [`EventBus`] while still
//!    holding the lock.
//!
//! Step 3 makes event sequence order identical to mutation order, and
//! lets [`EntityStore::subscribe_with_snapshot`] take a snapshot and a
//! subscription at the same point in the sequence. No critical section
//! awaits anything but the lock itself, so a simulator tick never waits
//! on another tick's I/O.
//!
//! Ambulance ownership is tracked explicitly: an ambulance is owned by at
//! most one incident, and an ambulance is IDLE exactly when it is not
//! owned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use dispatch_events::{
    AmbulanceUpdate, DispatchEvent, EventBus, EventEnvelope, HospitalSelected, IncidentDeleted,
    SimulationCancelled, SimulationComplete,
};
use dispatch_types::{
    Ambulance, AmbulanceId, AmbulanceMotion, AmbulanceStatus, CallerId, GeoPoint, Hazard, HazardBounds, HazardId,
    HazardType, Hospital, HospitalId, HospitalStatus, HospitalWithAmbulances, Incident,
    IncidentCategory, IncidentId, IncidentStatus, Phase, Severity, Snapshot, TriageType,
};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::error::DispatchError;

/// Fields of a new incident. Everything else is set by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    /// Scene location.
    pub location: GeoPoint,
    /// Clinical triage category.
    pub triage: TriageType,
    /// Free-text description.
    pub description: Option<String>,
    /// Classifier category.
    pub category: Option<IncidentCategory>,
    /// Severity.
    pub severity: Option<Severity>,
    /// Classifier confidence.
    pub ai_confidence: Option<f64>,
    /// Whether a demo scenario produced the incident.
    pub is_ai_generated: bool,
    /// Caller name.
    pub caller_name: Option<String>,
    /// Caller phone.
    pub caller_phone: Option<String>,
}

impl NewIncident {
    /// A plain incident at `location` with the given triage.
    pub const fn new(location: GeoPoint, triage: TriageType) -> Self {
        Self {
            location,
            triage,
            description: None,
            category: None,
            severity: None,
            ai_confidence: None,
            is_ai_generated: false,
            caller_name: None,
            caller_phone: None,
        }
    }
}

/// Fields of a new hazard.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHazard {
    /// Kind of hazard.
    pub hazard_type: HazardType,
    /// Description.
    pub description: String,
    /// Affected area.
    pub bounds: HazardBounds,
}

/// The tables guarded by the store lock.
#[derive(Debug, Default)]
struct Tables {
    incidents: BTreeMap<IncidentId, Incident>,
    ambulances: BTreeMap<AmbulanceId, Ambulance>,
    hospitals: BTreeMap<HospitalId, Hospital>,
    hazards: BTreeMap<HazardId, Hazard>,
    /// Ambulance -> incident that currently claims it.
    owners: BTreeMap<AmbulanceId, IncidentId>,
    /// Ambulance -> leg and remaining ETA of its running trip.
    motions: BTreeMap<AmbulanceId, AmbulanceMotion>,
}

/// The process-wide authoritative store.
#[derive(Debug)]
pub struct EntityStore {
    tables: RwLock<Tables>,
    bus: EventBus,
    callers: AtomicU32,
}

impl EntityStore {
    /// Create an empty store publishing on `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            bus,
            callers: AtomicU32::new(0),
        }
    }

    /// The bus this store publishes on.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Allocate the next caller id for scenario incidents.
    pub fn next_caller_id(&self) -> CallerId {
        CallerId(self.callers.fetch_add(1, Ordering::Relaxed).saturating_add(1))
    }

    fn publish(&self, events: Vec<DispatchEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Insert or replace a hospital.
    pub async fn insert_hospital(&self, hospital: Hospital) {
        let mut tables = self.tables.write().await;
        tables.hospitals.insert(hospital.id, hospital.clone());
        let view = tables.hospital_view(&hospital);
        self.publish(vec![DispatchEvent::HospitalUpdate(view)]);
    }

    /// Insert an ambulance. A non-IDLE ambulance is forced IDLE, since a
    /// freshly provisioned ambulance has no owning incident.
    pub async fn insert_ambulance(&self, mut ambulance: Ambulance) {
        ambulance.status = AmbulanceStatus::Idle;
        let mut tables = self.tables.write().await;
        tables.owners.remove(&ambulance.id);
        tables.ambulances.insert(ambulance.id, ambulance.clone());
        self.publish(vec![ambulance_event(&ambulance, None, None, None)]);
    }

    // -----------------------------------------------------------------------
    // Incidents
    // -----------------------------------------------------------------------

    /// Create a PENDING incident.
    pub async fn create_incident(&self, new: NewIncident) -> Result<Incident, DispatchError> {
        check_point(new.location)?;
        let now = Utc::now();
        let incident = Incident {
            id: IncidentId::new(),
            location: new.location,
            triage: new.triage,
            status: IncidentStatus::Pending,
            description: new.description,
            category: new.category,
            severity: new.severity,
            ai_confidence: new.ai_confidence,
            is_ai_generated: new.is_ai_generated,
            caller_name: new.caller_name,
            caller_phone: new.caller_phone,
            dispatcher_notes: None,
            assigned_ambulance_id: None,
            recommended_hospital_id: None,
            eta_seconds: None,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        tables.incidents.insert(incident.id, incident.clone());
        self.publish(vec![DispatchEvent::IncidentAdded(incident.clone())]);
        info!(incident_id = %incident.id, triage = ?incident.triage, "incident created");
        Ok(incident)
    }

    /// Fetch one incident.
    pub async fn get_incident(&self, id: IncidentId) -> Result<Incident, DispatchError> {
        self.tables.read().await.incident(id).cloned()
    }

    /// All incidents, oldest first, optionally filtered by status.
    pub async fn list_incidents(&self, status: Option<IncidentStatus>) -> Vec<Incident> {
        let tables = self.tables.read().await;
        sorted_incidents(
            tables
                .incidents
                .values()
                .filter(|incident| status.is_none_or(|s| incident.status == s)),
        )
    }

    /// Non-terminal incidents, oldest first.
    pub async fn list_active_incidents(&self) -> Vec<Incident> {
        let tables = self.tables.read().await;
        sorted_incidents(
            tables
                .incidents
                .values()
                .filter(|incident| !incident.status.is_terminal()),
        )
    }

    /// Move an incident along the state graph.
    ///
    /// `ASSIGNED` is reachable only through [`EntityStore::assign_ambulance`].
    /// `COMPLETED` and `CANCELLED` release the bound ambulance IDLE at its
    /// current position. Other steps keep the ambulance status in line
    /// with the incident (`ARRIVED` puts it ON_SCENE, `TRANSPORTING` puts
    /// it TRANSPORTING).
    pub async fn update_incident_status(
        &self,
        id: IncidentId,
        to: IncidentStatus,
    ) -> Result<Incident, DispatchError> {
        let mut tables = self.tables.write().await;
        let from = tables.incident(id)?.status;
        if to == IncidentStatus::Assigned || !from.can_transition_to(to) {
            warn!(incident_id = %id, %from, %to, "status transition rejected");
            return Err(DispatchError::InvalidTransition {
                incident_id: id,
                from,
                to,
            });
        }

        let now = Utc::now();
        let (incident, events) = match to {
            IncidentStatus::Cancelled => tables.cancel(id, "status update", now)?,
            IncidentStatus::Completed => tables.complete(id, None, now)?,
            _ => tables.advance(id, to, None, now)?,
        };
        self.publish(events);
        info!(incident_id = %id, %from, %to, "incident status updated");
        Ok(incident)
    }

    /// Bind an IDLE ambulance to a PENDING incident.
    ///
    /// The incident becomes ASSIGNED and the ambulance EN_ROUTE. Exactly
    /// one of any number of concurrent calls for the same ambulance (or
    /// the same incident) succeeds.
    pub async fn assign_ambulance(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        notes: Option<String>,
    ) -> Result<(Incident, Ambulance), DispatchError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let incident = tables
            .incidents
            .get_mut(&incident_id)
            .ok_or(DispatchError::IncidentNotFound(incident_id))?;
        if incident.status != IncidentStatus::Pending {
            return Err(DispatchError::IncidentNotAssignable {
                incident_id,
                status: incident.status,
            });
        }
        let ambulance = tables
            .ambulances
            .get_mut(&ambulance_id)
            .ok_or(DispatchError::AmbulanceNotFound(ambulance_id))?;
        if ambulance.status != AmbulanceStatus::Idle || tables.owners.contains_key(&ambulance_id) {
            warn!(%incident_id, %ambulance_id, status = %ambulance.status, "ambulance unavailable");
            return Err(DispatchError::AmbulanceUnavailable {
                ambulance_id,
                status: ambulance.status,
            });
        }

        let now = Utc::now();
        incident.status = IncidentStatus::Assigned;
        incident.assigned_ambulance_id = Some(ambulance_id);
        if notes.is_some() {
            incident.dispatcher_notes = notes;
        }
        incident.updated_at = now;
        ambulance.status = AmbulanceStatus::EnRoute;
        ambulance.updated_at = now;
        tables.owners.insert(ambulance_id, incident_id);
        tables.motions.remove(&ambulance_id);

        let incident = incident.clone();
        let ambulance = ambulance.clone();
        self.publish(vec![
            DispatchEvent::IncidentUpdate(incident.clone()),
            ambulance_event(&ambulance, Some(incident_id), None, None),
        ]);
        info!(%incident_id, %ambulance_id, "ambulance assigned");
        Ok((incident, ambulance))
    }

    /// ASSIGNED -> DISPATCHED for a live pairing, recording the ETA.
    pub async fn dispatch_incident(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        eta_seconds: u32,
    ) -> Result<Incident, DispatchError> {
        self.advance_pair(
            incident_id,
            ambulance_id,
            IncidentStatus::Dispatched,
            Some(eta_seconds),
        )
        .await
    }

    /// DISPATCHED -> EN_ROUTE for a live pairing.
    pub async fn depart(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        eta_seconds: u32,
    ) -> Result<Incident, DispatchError> {
        self.advance_pair(
            incident_id,
            ambulance_id,
            IncidentStatus::EnRoute,
            Some(eta_seconds),
        )
        .await
    }

    async fn advance_pair(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        to: IncidentStatus,
        eta_seconds: Option<u32>,
    ) -> Result<Incident, DispatchError> {
        let mut tables = self.tables.write().await;
        tables.check_pair(incident_id, ambulance_id)?;
        let from = tables.incident(incident_id)?.status;
        if !from.can_transition_to(to) {
            return Err(DispatchError::InvalidTransition {
                incident_id,
                from,
                to,
            });
        }
        let (incident, events) = tables.advance(incident_id, to, eta_seconds, Utc::now())?;
        self.publish(events);
        info!(%incident_id, %ambulance_id, %to, "incident advanced");
        Ok(incident)
    }

    /// One simulator tick: move the ambulance and report the remaining
    /// ETA. The incident's ETA and the ambulance's motion follow the
    /// tick; the `AMBULANCE_UPDATE` event is the only delta published.
    /// Fails with `Conflict` if the pairing is no longer live.
    pub async fn record_movement(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        location: GeoPoint,
        phase: Phase,
        eta_seconds: u32,
    ) -> Result<Ambulance, DispatchError> {
        let mut tables = self.tables.write().await;
        tables.check_pair(incident_id, ambulance_id)?;
        let now = Utc::now();
        let incident = tables.incident_mut(incident_id)?;
        incident.eta_seconds = Some(eta_seconds);
        incident.updated_at = now;
        let ambulance = tables.ambulance_mut(ambulance_id)?;
        ambulance.location = location;
        ambulance.updated_at = now;
        let ambulance = ambulance.clone();
        tables.set_motion(ambulance_id, incident_id, phase, eta_seconds);
        self.publish(vec![ambulance_event(
            &ambulance,
            Some(incident_id),
            Some(phase),
            Some(eta_seconds),
        )]);
        debug!(%incident_id, %ambulance_id, ?phase, eta_seconds, "movement recorded");
        Ok(ambulance)
    }

    /// EN_ROUTE -> ARRIVED: the ambulance is at the scene and ON_SCENE.
    pub async fn arrive_on_scene(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
    ) -> Result<Incident, DispatchError> {
        let mut tables = self.tables.write().await;
        tables.check_pair(incident_id, ambulance_id)?;
        let scene = tables.incident(incident_id)?.location;
        tables.ambulance_mut(ambulance_id)?.location = scene;
        let (incident, events) =
            tables.advance(incident_id, IncidentStatus::Arrived, None, Utc::now())?;
        self.publish(events);
        info!(%incident_id, %ambulance_id, "ambulance arrived on scene");
        Ok(incident)
    }

    /// ARRIVED -> TRANSPORTING towards `hospital_id`.
    pub async fn begin_transport(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        hospital_id: HospitalId,
        eta_seconds: u32,
    ) -> Result<Incident, DispatchError> {
        let mut tables = self.tables.write().await;
        tables.check_pair(incident_id, ambulance_id)?;
        tables.hospital(hospital_id)?;
        let (incident, events) = tables.advance(
            incident_id,
            IncidentStatus::Transporting,
            Some(eta_seconds),
            Utc::now(),
        )?;
        self.publish(events);
        info!(%incident_id, %ambulance_id, %hospital_id, "transport started");
        Ok(incident)
    }

    /// ARRIVED or TRANSPORTING -> COMPLETED. The ambulance is released
    /// IDLE at `location` in the same step.
    pub async fn complete_incident(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        location: GeoPoint,
    ) -> Result<Incident, DispatchError> {
        let mut tables = self.tables.write().await;
        tables.check_pair(incident_id, ambulance_id)?;
        let from = tables.incident(incident_id)?.status;
        if !from.can_transition_to(IncidentStatus::Completed) {
            return Err(DispatchError::InvalidTransition {
                incident_id,
                from,
                to: IncidentStatus::Completed,
            });
        }
        let (incident, events) = tables.complete(incident_id, Some(location), Utc::now())?;
        self.publish(events);
        info!(%incident_id, %ambulance_id, "incident completed");
        Ok(incident)
    }

    /// One tick of the return leg. The ambulance must still be IDLE and
    /// unowned; once another dispatch claims it this fails with
    /// `Conflict` and the return leg stops.
    pub async fn record_return_movement(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        location: GeoPoint,
        eta_seconds: u32,
    ) -> Result<Ambulance, DispatchError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let owned = tables.owners.contains_key(&ambulance_id);
        let ambulance = tables.ambulance_mut(ambulance_id)?;
        if owned || ambulance.status != AmbulanceStatus::Idle {
            return Err(DispatchError::Conflict(format!(
                "ambulance {ambulance_id} was claimed during its return leg"
            )));
        }
        ambulance.location = location;
        ambulance.updated_at = Utc::now();
        let ambulance = ambulance.clone();
        if eta_seconds == 0 {
            tables.motions.remove(&ambulance_id);
        } else {
            tables.set_motion(ambulance_id, incident_id, Phase::Returning, eta_seconds);
        }
        self.publish(vec![ambulance_event(
            &ambulance,
            Some(incident_id),
            Some(Phase::Returning),
            Some(eta_seconds),
        )]);
        debug!(%incident_id, %ambulance_id, eta_seconds, "return movement recorded");
        Ok(ambulance)
    }

    /// Cancel a non-terminal incident, releasing its ambulance IDLE where
    /// it currently is.
    pub async fn cancel_incident(
        &self,
        id: IncidentId,
        reason: &str,
    ) -> Result<Incident, DispatchError> {
        let mut tables = self.tables.write().await;
        let from = tables.incident(id)?.status;
        if from.is_terminal() {
            return Err(DispatchError::InvalidTransition {
                incident_id: id,
                from,
                to: IncidentStatus::Cancelled,
            });
        }
        let (incident, events) = tables.cancel(id, reason, Utc::now())?;
        self.publish(events);
        info!(incident_id = %id, %from, reason, "incident cancelled");
        Ok(incident)
    }

    /// Remove a terminal incident.
    pub async fn delete_incident(&self, id: IncidentId) -> Result<(), DispatchError> {
        let mut tables = self.tables.write().await;
        let status = tables.incident(id)?.status;
        if !status.is_terminal() {
            return Err(DispatchError::Conflict(format!(
                "incident {id} is {status}; only completed or cancelled incidents can be deleted"
            )));
        }
        tables.incidents.remove(&id);
        self.publish(vec![DispatchEvent::IncidentDeleted(IncidentDeleted {
            incident_id: id,
        })]);
        info!(incident_id = %id, "incident deleted");
        Ok(())
    }

    /// Record the hospital chosen for a non-terminal incident.
    pub async fn set_recommended_hospital(
        &self,
        incident_id: IncidentId,
        hospital_id: HospitalId,
    ) -> Result<Incident, DispatchError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let hospital_name = tables.hospital(hospital_id)?.name.clone();
        let incident = tables.incident_mut(incident_id)?;
        if incident.status.is_terminal() {
            return Err(DispatchError::Conflict(format!(
                "incident {incident_id} is already {}",
                incident.status
            )));
        }
        incident.recommended_hospital_id = Some(hospital_id);
        incident.updated_at = Utc::now();
        let incident = incident.clone();
        self.publish(vec![
            DispatchEvent::IncidentUpdate(incident.clone()),
            DispatchEvent::HospitalSelected(HospitalSelected {
                incident_id,
                hospital_id,
                hospital_name,
            }),
        ]);
        info!(%incident_id, %hospital_id, "hospital selected");
        Ok(incident)
    }

    // -----------------------------------------------------------------------
    // Ambulances
    // -----------------------------------------------------------------------

    /// Fetch one ambulance.
    pub async fn get_ambulance(&self, id: AmbulanceId) -> Result<Ambulance, DispatchError> {
        self.tables.read().await.ambulance(id).cloned()
    }

    /// All ambulances by id, optionally only IDLE ones.
    pub async fn list_ambulances(&self, idle_only: bool) -> Vec<Ambulance> {
        self.tables
            .read()
            .await
            .ambulances
            .values()
            .filter(|a| !idle_only || a.status == AmbulanceStatus::Idle)
            .cloned()
            .collect()
    }

    /// Incident currently claiming the ambulance, if any.
    pub async fn owner_of(&self, id: AmbulanceId) -> Option<IncidentId> {
        self.tables.read().await.owners.get(&id).copied()
    }

    /// Move an ambulance by hand.
    pub async fn update_ambulance_location(
        &self,
        id: AmbulanceId,
        location: GeoPoint,
    ) -> Result<Ambulance, DispatchError> {
        check_point(location)?;
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let owner = tables.owners.get(&id).copied();
        let ambulance = tables.ambulance_mut(id)?;
        ambulance.location = location;
        ambulance.updated_at = Utc::now();
        let ambulance = ambulance.clone();
        self.publish(vec![ambulance_event(&ambulance, owner, None, None)]);
        info!(ambulance_id = %id, "ambulance location updated");
        Ok(ambulance)
    }

    /// Change an ambulance status by hand without breaking ownership: an
    /// owned ambulance may only move between non-IDLE statuses, and an
    /// unowned ambulance may only be set IDLE.
    pub async fn update_ambulance_status(
        &self,
        id: AmbulanceId,
        status: AmbulanceStatus,
    ) -> Result<Ambulance, DispatchError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let owner = tables.owners.get(&id).copied();
        let ambulance = tables.ambulance_mut(id)?;

        let allowed = match owner {
            Some(_) => status != AmbulanceStatus::Idle,
            None => status == AmbulanceStatus::Idle,
        };
        if !allowed {
            warn!(ambulance_id = %id, from = %ambulance.status, to = %status, "ambulance status rejected");
            return Err(match owner {
                Some(incident_id) => DispatchError::Conflict(format!(
                    "ambulance {id} is assigned to incident {incident_id}; cancel or complete it instead"
                )),
                None => DispatchError::InvalidRequest(format!(
                    "ambulance {id} has no incident; only IDLE is allowed"
                )),
            });
        }

        ambulance.status = status;
        ambulance.updated_at = Utc::now();
        let ambulance = ambulance.clone();
        self.publish(vec![ambulance_event(&ambulance, owner, None, None)]);
        info!(ambulance_id = %id, %status, "ambulance status updated");
        Ok(ambulance)
    }

    // -----------------------------------------------------------------------
    // Hospitals
    // -----------------------------------------------------------------------

    /// All hospitals by id, with derived ambulance counts.
    pub async fn list_hospitals(&self) -> Vec<Hospital> {
        let tables = self.tables.read().await;
        tables
            .hospitals
            .values()
            .map(|h| tables.hospital_view(h))
            .collect()
    }

    /// Fetch one hospital with its derived ambulance count.
    pub async fn get_hospital(&self, id: HospitalId) -> Result<Hospital, DispatchError> {
        let tables = self.tables.read().await;
        let hospital = tables.hospital(id)?;
        Ok(tables.hospital_view(hospital))
    }

    /// Hospital detail including the ambulances homed there.
    pub async fn hospital_detail(
        &self,
        id: HospitalId,
    ) -> Result<HospitalWithAmbulances, DispatchError> {
        let tables = self.tables.read().await;
        let hospital = tables.hospital_view(tables.hospital(id)?);
        let ambulances = tables
            .ambulances
            .values()
            .filter(|a| a.hospital_id == Some(id))
            .cloned()
            .collect();
        Ok(HospitalWithAmbulances {
            hospital,
            ambulances,
        })
    }

    /// Update a hospital's operating status and load.
    pub async fn update_hospital_status(
        &self,
        id: HospitalId,
        status: HospitalStatus,
        load: u8,
    ) -> Result<Hospital, DispatchError> {
        if load > 100 {
            return Err(DispatchError::InvalidRequest(format!(
                "load {load} is outside 0..=100"
            )));
        }
        let mut tables = self.tables.write().await;
        let hospital = tables
            .hospitals
            .get_mut(&id)
            .ok_or(DispatchError::HospitalNotFound(id))?;
        hospital.status = status;
        hospital.load = load;
        hospital.updated_at = Utc::now();
        let hospital = hospital.clone();
        let view = tables.hospital_view(&hospital);
        self.publish(vec![DispatchEvent::HospitalUpdate(view.clone())]);
        info!(hospital_id = %id, ?status, load, "hospital status updated");
        Ok(view)
    }

    // -----------------------------------------------------------------------
    // Hazards
    // -----------------------------------------------------------------------

    /// Create an active hazard.
    pub async fn create_hazard(&self, new: NewHazard) -> Result<Hazard, DispatchError> {
        let bounds = new.bounds;
        if bounds.min_lat > bounds.max_lat || bounds.min_lng > bounds.max_lng {
            return Err(DispatchError::InvalidRequest(
                "hazard bounds are inverted".to_owned(),
            ));
        }
        let now = Utc::now();
        let hazard = Hazard {
            id: HazardId::new(),
            hazard_type: new.hazard_type,
            description: new.description,
            bounds,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.write().await;
        tables.hazards.insert(hazard.id, hazard.clone());
        self.publish(vec![DispatchEvent::HazardUpdate(hazard.clone())]);
        info!(hazard_id = %hazard.id, hazard_type = ?hazard.hazard_type, "hazard created");
        Ok(hazard)
    }

    /// Toggle a hazard or change its description.
    pub async fn update_hazard(
        &self,
        id: HazardId,
        active: Option<bool>,
        description: Option<String>,
    ) -> Result<Hazard, DispatchError> {
        let mut tables = self.tables.write().await;
        let hazard = tables
            .hazards
            .get_mut(&id)
            .ok_or(DispatchError::HazardNotFound(id))?;
        if let Some(active) = active {
            hazard.active = active;
        }
        if let Some(description) = description {
            hazard.description = description;
        }
        hazard.updated_at = Utc::now();
        let hazard = hazard.clone();
        self.publish(vec![DispatchEvent::HazardUpdate(hazard.clone())]);
        info!(hazard_id = %id, active = hazard.active, "hazard updated");
        Ok(hazard)
    }

    /// Fetch one hazard.
    pub async fn get_hazard(&self, id: HazardId) -> Result<Hazard, DispatchError> {
        self.tables
            .read()
            .await
            .hazards
            .get(&id)
            .cloned()
            .ok_or(DispatchError::HazardNotFound(id))
    }

    /// All hazards, oldest first.
    pub async fn list_hazards(&self) -> Vec<Hazard> {
        self.tables.read().await.hazards.values().cloned().collect()
    }

    /// Hazards that currently affect routing.
    pub async fn active_hazards(&self) -> Vec<Hazard> {
        self.tables
            .read()
            .await
            .hazards
            .values()
            .filter(|h| h.active)
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Full state at the current point of the event sequence.
    pub async fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read().await;
        tables.snapshot(self.bus.current_seq())
    }

    /// Subscribe to the event stream and take a snapshot at the same
    /// sequence point: the receiver yields exactly the events with
    /// `seq > snapshot.seq`.
    pub async fn subscribe_with_snapshot(
        &self,
    ) -> (broadcast::Receiver<Arc<EventEnvelope>>, Snapshot) {
        let tables = self.tables.read().await;
        let rx = self.bus.subscribe();
        let snapshot = tables.snapshot(self.bus.current_seq());
        (rx, snapshot)
    }
}

// ---------------------------------------------------------------------------
// Table operations (called with the write lock held)
// ---------------------------------------------------------------------------

impl Tables {
    fn incident(&self, id: IncidentId) -> Result<&Incident, DispatchError> {
        self.incidents
            .get(&id)
            .ok_or(DispatchError::IncidentNotFound(id))
    }

    fn incident_mut(&mut self, id: IncidentId) -> Result<&mut Incident, DispatchError> {
        self.incidents
            .get_mut(&id)
            .ok_or(DispatchError::IncidentNotFound(id))
    }

    fn ambulance(&self, id: AmbulanceId) -> Result<&Ambulance, DispatchError> {
        self.ambulances
            .get(&id)
            .ok_or(DispatchError::AmbulanceNotFound(id))
    }

    fn ambulance_mut(&mut self, id: AmbulanceId) -> Result<&mut Ambulance, DispatchError> {
        self.ambulances
            .get_mut(&id)
            .ok_or(DispatchError::AmbulanceNotFound(id))
    }

    fn hospital(&self, id: HospitalId) -> Result<&Hospital, DispatchError> {
        self.hospitals
            .get(&id)
            .ok_or(DispatchError::HospitalNotFound(id))
    }

    /// Copy of `hospital` with its ambulance count filled in.
    fn hospital_view(&self, hospital: &Hospital) -> Hospital {
        let count = self
            .ambulances
            .values()
            .filter(|a| a.hospital_id == Some(hospital.id))
            .count();
        Hospital {
            ambulance_count: u32::try_from(count).unwrap_or(u32::MAX),
            ..hospital.clone()
        }
    }

    /// Verify that `incident_id` still holds `ambulance_id`.
    fn check_pair(
        &self,
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
    ) -> Result<(), DispatchError> {
        let incident = self.incident(incident_id)?;
        self.ambulance(ambulance_id)?;
        let live = !incident.status.is_terminal()
            && incident.assigned_ambulance_id == Some(ambulance_id)
            && self.owners.get(&ambulance_id) == Some(&incident_id);
        if live {
            Ok(())
        } else {
            Err(DispatchError::Conflict(format!(
                "incident {incident_id} no longer holds ambulance {ambulance_id}"
            )))
        }
    }

    /// Apply a non-terminal step and align the ambulance status with it.
    fn advance(
        &mut self,
        id: IncidentId,
        to: IncidentStatus,
        eta_seconds: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(Incident, Vec<DispatchEvent>), DispatchError> {
        let incident = self.incident_mut(id)?;
        incident.status = to;
        incident.eta_seconds = eta_seconds;
        incident.updated_at = now;
        let incident = incident.clone();

        if let Some(ambulance_id) = incident.assigned_ambulance_id {
            match (motion_phase_for(to), eta_seconds) {
                (Some(phase), Some(eta)) => self.set_motion(ambulance_id, id, phase, eta),
                _ => {
                    self.motions.remove(&ambulance_id);
                }
            }
        }

        let mut events = vec![DispatchEvent::IncidentUpdate(incident.clone())];
        if let (Some(ambulance_id), Some(status)) =
            (incident.assigned_ambulance_id, ambulance_status_for(to))
        {
            let ambulance = self.ambulance_mut(ambulance_id)?;
            if ambulance.status != status {
                ambulance.status = status;
                ambulance.updated_at = now;
                events.push(ambulance_event(ambulance, Some(id), None, eta_seconds));
            }
        }
        Ok((incident, events))
    }

    /// Unbind the incident's ambulance (if any) and mark it IDLE, at
    /// `location` when given or where it is otherwise.
    fn release(
        &mut self,
        incident: &mut Incident,
        location: Option<GeoPoint>,
        now: DateTime<Utc>,
    ) -> Option<Ambulance> {
        let ambulance_id = incident.assigned_ambulance_id.take()?;
        if self.owners.get(&ambulance_id) == Some(&incident.id) {
            self.owners.remove(&ambulance_id);
            self.motions.remove(&ambulance_id);
        }
        let ambulance = self.ambulances.get_mut(&ambulance_id)?;
        ambulance.status = AmbulanceStatus::Idle;
        if let Some(location) = location {
            ambulance.location = location;
        }
        ambulance.updated_at = now;
        Some(ambulance.clone())
    }

    fn complete(
        &mut self,
        id: IncidentId,
        location: Option<GeoPoint>,
        now: DateTime<Utc>,
    ) -> Result<(Incident, Vec<DispatchEvent>), DispatchError> {
        let mut incident = self.incident(id)?.clone();
        let released = self.release(&mut incident, location, now);
        incident.status = IncidentStatus::Completed;
        incident.eta_seconds = None;
        incident.updated_at = now;
        self.incidents.insert(id, incident.clone());

        let mut events = vec![DispatchEvent::IncidentUpdate(incident.clone())];
        if let Some(ambulance) = released {
            events.push(ambulance_event(&ambulance, Some(id), None, None));
            events.push(DispatchEvent::SimulationComplete(SimulationComplete {
                incident_id: id,
                ambulance_id: ambulance.id,
                completed_at: now,
            }));
        }
        Ok((incident, events))
    }

    fn cancel(
        &mut self,
        id: IncidentId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Incident, Vec<DispatchEvent>), DispatchError> {
        let mut incident = self.incident(id)?.clone();
        let released = self.release(&mut incident, None, now);
        incident.status = IncidentStatus::Cancelled;
        incident.eta_seconds = None;
        incident.updated_at = now;
        self.incidents.insert(id, incident.clone());

        let mut events = vec![DispatchEvent::IncidentUpdate(incident.clone())];
        if let Some(ambulance) = &released {
            events.push(ambulance_event(ambulance, Some(id), None, None));
        }
        events.push(DispatchEvent::SimulationCancelled(SimulationCancelled {
            incident_id: id,
            ambulance_id: released.map(|a| a.id),
            reason: reason.to_owned(),
        }));
        Ok((incident, events))
    }

    fn set_motion(
        &mut self,
        ambulance_id: AmbulanceId,
        incident_id: IncidentId,
        phase: Phase,
        eta_seconds: u32,
    ) {
        self.motions.insert(
            ambulance_id,
            AmbulanceMotion {
                ambulance_id,
                incident_id,
                phase,
                eta_seconds,
            },
        );
    }

    fn snapshot(&self, seq: u64) -> Snapshot {
        Snapshot {
            seq,
            taken_at: Utc::now(),
            incidents: sorted_incidents(self.incidents.values()),
            ambulances: self.ambulances.values().cloned().collect(),
            hospitals: self
                .hospitals
                .values()
                .map(|h| self.hospital_view(h))
                .collect(),
            hazards: self.hazards.values().cloned().collect(),
            motions: self.motions.values().copied().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Movement leg of a simulated incident in `status`, if it is moving.
const fn motion_phase_for(status: IncidentStatus) -> Option<Phase> {
    match status {
        IncidentStatus::Dispatched | IncidentStatus::EnRoute => Some(Phase::ToScene),
        IncidentStatus::Transporting => Some(Phase::ToHospital),
        _ => None,
    }
}

/// Ambulance status implied by a non-terminal incident status.
const fn ambulance_status_for(status: IncidentStatus) -> Option<AmbulanceStatus> {
    match status {
        IncidentStatus::Assigned | IncidentStatus::Dispatched | IncidentStatus::EnRoute => {
            Some(AmbulanceStatus::EnRoute)
        }
        IncidentStatus::Arrived => Some(AmbulanceStatus::OnScene),
        IncidentStatus::Transporting => Some(AmbulanceStatus::Transporting),
        IncidentStatus::Pending | IncidentStatus::Completed | IncidentStatus::Cancelled => None,
    }
}

fn ambulance_event(
    ambulance: &Ambulance,
    incident_id: Option<IncidentId>,
    phase: Option<Phase>,
    eta_seconds: Option<u32>,
) -> DispatchEvent {
    DispatchEvent::AmbulanceUpdate(AmbulanceUpdate {
        ambulance: ambulance.clone(),
        incident_id,
        phase,
        eta_seconds,
    })
}

fn sorted_incidents<'a>(incidents: impl Iterator<Item = &'a Incident>) -> Vec<Incident> {
    let mut list: Vec<Incident> = incidents.cloned().collect();
    list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    list
}

fn check_point(point: GeoPoint) -> Result<(), DispatchError> {
    let valid = point.lat.is_finite()
        && point.lng.is_finite()
        && (-90.0..=90.0).contains(&point.lat)
        && (-180.0..=180.0).contains(&point.lng);
    if valid {
        Ok(())
    } else {
        Err(DispatchError::InvalidRequest(format!(
            "coordinates ({}, {}) are out of range",
            point.lat, point.lng
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dispatch_types::{AmbulanceType, HospitalCapability};

    use super::*;

    const SCENE: GeoPoint = GeoPoint::new(3.1390, 101.6869);

    fn ambulance(id: u32, status: AmbulanceStatus) -> Ambulance {
        Ambulance {
            id: AmbulanceId(id),
            callsign: format!("MEDIC-{id}"),
            ambulance_type: AmbulanceType::Als,
            status,
            location: GeoPoint::new(3.15, 101.70),
            hospital_id: Some(HospitalId(1)),
            updated_at: Utc::now(),
        }
    }

    async fn store_with_fleet(count: u32) -> EntityStore {
        let store = EntityStore::new(EventBus::new(1024));
        let now = Utc::now();
        store
            .insert_hospital(Hospital {
                id: HospitalId(1),
                name: "Hospital Kuala Lumpur".to_owned(),
                location: GeoPoint::new(3.1717, 101.7012),
                capabilities: vec![HospitalCapability::General, HospitalCapability::Pci],
                status: HospitalStatus::Open,
                load: 40,
                ambulance_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await;
        for id in 1..=count {
            store.insert_ambulance(ambulance(id, AmbulanceStatus::Idle)).await;
        }
        store
    }

    /// Every non-IDLE ambulance is claimed by exactly one live incident
    /// that references it, and vice versa.
    async fn assert_ownership_invariants(store: &EntityStore) {
        let snapshot = store.snapshot().await;
        for ambulance in &snapshot.ambulances {
            let holders: Vec<&Incident> = snapshot
                .incidents
                .iter()
                .filter(|i| i.assigned_ambulance_id == Some(ambulance.id))
                .collect();
            if ambulance.status == AmbulanceStatus::Idle {
                assert!(holders.is_empty(), "idle ambulance {} is held", ambulance.id);
            } else {
                assert_eq!(holders.len(), 1, "ambulance {} holders", ambulance.id);
            }
        }
        for incident in &snapshot.incidents {
            assert_eq!(
                incident.assigned_ambulance_id.is_some(),
                incident.status.holds_ambulance(),
                "incident {} in {}",
                incident.id,
                incident.status
            );
        }
    }

    #[tokio::test]
    async fn assign_binds_both_sides() {
        let store = store_with_fleet(2).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::Stemi))
            .await
            .unwrap();

        let (incident, ambulance) = store
            .assign_ambulance(incident.id, AmbulanceId(1), Some("priority".to_owned()))
            .await
            .unwrap();
        assert_eq!(incident.status, IncidentStatus::Assigned);
        assert_eq!(incident.assigned_ambulance_id, Some(AmbulanceId(1)));
        assert_eq!(incident.dispatcher_notes.as_deref(), Some("priority"));
        assert_eq!(ambulance.status, AmbulanceStatus::EnRoute);
        assert_eq!(store.owner_of(AmbulanceId(1)).await, Some(incident.id));
        assert_ownership_invariants(&store).await;
    }

    #[tokio::test]
    async fn busy_ambulance_is_unavailable() {
        let store = store_with_fleet(1).await;
        let first = store
            .create_incident(NewIncident::new(SCENE, TriageType::General))
            .await
            .unwrap();
        let second = store
            .create_incident(NewIncident::new(SCENE, TriageType::General))
            .await
            .unwrap();
        store
            .assign_ambulance(first.id, AmbulanceId(1), None)
            .await
            .unwrap();

        let err = store
            .assign_ambulance(second.id, AmbulanceId(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AmbulanceUnavailable { .. }));
        assert_eq!(
            store.get_incident(second.id).await.unwrap().status,
            IncidentStatus::Pending
        );
    }

    #[tokio::test]
    async fn assigned_incident_is_not_assignable() {
        let store = store_with_fleet(2).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::General))
            .await
            .unwrap();
        store
            .assign_ambulance(incident.id, AmbulanceId(1), None)
            .await
            .unwrap();
        let err = store
            .assign_ambulance(incident.id, AmbulanceId(2), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::IncidentNotAssignable { .. }));
        assert_eq!(
            store.get_ambulance(AmbulanceId(2)).await.unwrap().status,
            AmbulanceStatus::Idle
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assign_has_exactly_one_winner() {
        for _ in 0..20 {
            let store = Arc::new(store_with_fleet(1).await);
            let a = store
                .create_incident(NewIncident::new(SCENE, TriageType::General))
                .await
                .unwrap();
            let b = store
                .create_incident(NewIncident::new(SCENE, TriageType::General))
                .await
                .unwrap();

            let left = tokio::spawn({
                let store = Arc::clone(&store);
                async move { store.assign_ambulance(a.id, AmbulanceId(1), None).await }
            });
            let right = tokio::spawn({
                let store = Arc::clone(&store);
                async move { store.assign_ambulance(b.id, AmbulanceId(1), None).await }
            });
            let results = [left.await.unwrap(), right.await.unwrap()];

            let wins = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(wins, 1);
            assert!(results.iter().any(|r| matches!(
                r,
                Err(DispatchError::AmbulanceUnavailable { .. } | DispatchError::Conflict(_))
            )));
            assert_ownership_invariants(&store).await;
        }
    }

    #[tokio::test]
    async fn illegal_transition_leaves_state_unchanged() {
        let store = store_with_fleet(1).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::Trauma))
            .await
            .unwrap();
        let before = store.get_incident(incident.id).await.unwrap();
        let seq_before = store.bus().current_seq();

        for to in [
            IncidentStatus::Dispatched,
            IncidentStatus::Completed,
            IncidentStatus::Assigned,
        ] {
            let err = store
                .update_incident_status(incident.id, to)
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::InvalidTransition { .. }));
        }
        assert_eq!(store.get_incident(incident.id).await.unwrap(), before);
        assert_eq!(store.bus().current_seq(), seq_before);
    }

    #[tokio::test]
    async fn manual_walk_through_lifecycle_releases_ambulance() {
        let store = store_with_fleet(1).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::Stemi))
            .await
            .unwrap();
        store
            .assign_ambulance(incident.id, AmbulanceId(1), None)
            .await
            .unwrap();

        for to in [
            IncidentStatus::Dispatched,
            IncidentStatus::EnRoute,
            IncidentStatus::Arrived,
            IncidentStatus::Transporting,
        ] {
            store.update_incident_status(incident.id, to).await.unwrap();
            assert_ownership_invariants(&store).await;
        }
        assert_eq!(
            store.get_ambulance(AmbulanceId(1)).await.unwrap().status,
            AmbulanceStatus::Transporting
        );

        let done = store
            .update_incident_status(incident.id, IncidentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.assigned_ambulance_id, None);
        assert_eq!(
            store.get_ambulance(AmbulanceId(1)).await.unwrap().status,
            AmbulanceStatus::Idle
        );
        assert_ownership_invariants(&store).await;

        let err = store
            .update_incident_status(incident.id, IncidentStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn cancel_releases_at_current_position() {
        let store = store_with_fleet(1).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::Stroke))
            .await
            .unwrap();
        store
            .assign_ambulance(incident.id, AmbulanceId(1), None)
            .await
            .unwrap();
        store
            .dispatch_incident(incident.id, AmbulanceId(1), 120)
            .await
            .unwrap();
        let midway = GeoPoint::new(3.145, 101.69);
        store
            .record_movement(incident.id, AmbulanceId(1), midway, Phase::ToScene, 60)
            .await
            .unwrap();

        let mut rx = store.bus().subscribe();
        let cancelled = store
            .cancel_incident(incident.id, "operator")
            .await
            .unwrap();
        assert_eq!(cancelled.status, IncidentStatus::Cancelled);

        let ambulance = store.get_ambulance(AmbulanceId(1)).await.unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Idle);
        assert_eq!(ambulance.location, midway);

        let types: Vec<&str> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.event.type_name())
        .collect();
        assert_eq!(
            types,
            ["INCIDENT_UPDATE", "AMBULANCE_UPDATE", "SIMULATION_CANCELLED"]
        );

        // Stale simulator writes are rejected once the pairing is gone.
        let err = store
            .record_movement(incident.id, AmbulanceId(1), SCENE, Phase::ToScene, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));
    }

    #[tokio::test]
    async fn snapshot_tracks_trip_progress() {
        let store = store_with_fleet(1).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::Stroke))
            .await
            .unwrap();
        store
            .assign_ambulance(incident.id, AmbulanceId(1), None)
            .await
            .unwrap();
        store
            .dispatch_incident(incident.id, AmbulanceId(1), 358)
            .await
            .unwrap();
        store
            .depart(incident.id, AmbulanceId(1), 358)
            .await
            .unwrap();
        store
            .record_movement(
                incident.id,
                AmbulanceId(1),
                GeoPoint::new(3.145, 101.69),
                Phase::ToScene,
                299,
            )
            .await
            .unwrap();

        let (_rx, snapshot) = store.subscribe_with_snapshot().await;
        assert_eq!(snapshot.incidents.first().unwrap().eta_seconds, Some(299));
        assert_eq!(
            snapshot.motions,
            vec![AmbulanceMotion {
                ambulance_id: AmbulanceId(1),
                incident_id: incident.id,
                phase: Phase::ToScene,
                eta_seconds: 299,
            }]
        );

        store.arrive_on_scene(incident.id, AmbulanceId(1)).await.unwrap();
        assert!(store.snapshot().await.motions.is_empty());

        store
            .begin_transport(incident.id, AmbulanceId(1), HospitalId(1), 240)
            .await
            .unwrap();
        let motions = store.snapshot().await.motions;
        let motion = motions.first().unwrap();
        assert_eq!(motion.phase, Phase::ToHospital);
        assert_eq!(motion.eta_seconds, 240);

        let hospital = GeoPoint::new(3.1717, 101.7012);
        store
            .complete_incident(incident.id, AmbulanceId(1), hospital)
            .await
            .unwrap();
        assert!(store.snapshot().await.motions.is_empty());

        store
            .record_return_movement(incident.id, AmbulanceId(1), hospital, 90)
            .await
            .unwrap();
        let motions = store.snapshot().await.motions;
        assert_eq!(motions.first().unwrap().phase, Phase::Returning);
        store
            .record_return_movement(incident.id, AmbulanceId(1), hospital, 0)
            .await
            .unwrap();
        assert!(store.snapshot().await.motions.is_empty());
    }

    #[tokio::test]
    async fn ambulance_status_respects_ownership() {
        let store = store_with_fleet(2).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::General))
            .await
            .unwrap();
        store
            .assign_ambulance(incident.id, AmbulanceId(1), None)
            .await
            .unwrap();

        assert!(
            store
                .update_ambulance_status(AmbulanceId(1), AmbulanceStatus::Idle)
                .await
                .is_err()
        );
        assert!(
            store
                .update_ambulance_status(AmbulanceId(2), AmbulanceStatus::EnRoute)
                .await
                .is_err()
        );
        let updated = store
            .update_ambulance_status(AmbulanceId(1), AmbulanceStatus::OnScene)
            .await
            .unwrap();
        assert_eq!(updated.status, AmbulanceStatus::OnScene);
        assert_ownership_invariants(&store).await;
    }

    #[tokio::test]
    async fn only_terminal_incidents_are_deleted() {
        let store = store_with_fleet(1).await;
        let incident = store
            .create_incident(NewIncident::new(SCENE, TriageType::General))
            .await
            .unwrap();
        assert!(matches!(
            store.delete_incident(incident.id).await,
            Err(DispatchError::Conflict(_))
        ));

        store.cancel_incident(incident.id, "test").await.unwrap();
        store.delete_incident(incident.id).await.unwrap();
        assert!(
            store
                .get_incident(incident.id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn snapshot_and_subscription_share_a_sequence_point() {
        let store = store_with_fleet(1).await;
        store
            .create_incident(NewIncident::new(SCENE, TriageType::General))
            .await
            .unwrap();

        let (mut rx, snapshot) = store.subscribe_with_snapshot().await;
        assert_eq!(snapshot.seq, store.bus().current_seq());
        assert_eq!(snapshot.incidents.len(), 1);

        let added = store
            .create_incident(NewIncident::new(SCENE, TriageType::Burns))
            .await
            .unwrap();
        let next = rx.recv().await.unwrap();
        assert_eq!(next.seq, snapshot.seq + 1);
        assert_eq!(next.event.incident_id(), Some(added.id));
    }

    #[tokio::test]
    async fn hospital_counts_are_derived() {
        let store = store_with_fleet(3).await;
        let hospital = store.get_hospital(HospitalId(1)).await.unwrap();
        assert_eq!(hospital.ambulance_count, 3);

        let detail = store.hospital_detail(HospitalId(1)).await.unwrap();
        assert_eq!(detail.ambulances.len(), 3);

        let updated = store
            .update_hospital_status(HospitalId(1), HospitalStatus::Diverting, 95)
            .await
            .unwrap();
        assert_eq!(updated.status, HospitalStatus::Diverting);
        assert_eq!(updated.ambulance_count, 3);
        assert!(
            store
                .update_hospital_status(HospitalId(1), HospitalStatus::Open, 101)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn hazards_can_be_toggled() {
        let store = store_with_fleet(0).await;
        let hazard = store
            .create_hazard(NewHazard {
                hazard_type: HazardType::Flood,
                description: "Jalan Tun Razak underpass flooded".to_owned(),
                bounds: HazardBounds {
                    min_lat: 3.15,
                    max_lat: 3.16,
                    min_lng: 101.71,
                    max_lng: 101.72,
                },
            })
            .await
            .unwrap();
        assert_eq!(store.active_hazards().await.len(), 1);

        store
            .update_hazard(hazard.id, Some(false), None)
            .await
            .unwrap();
        assert!(store.active_hazards().await.is_empty());
        assert_eq!(store.list_hazards().await.len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_location_is_rejected() {
        let store = store_with_fleet(0).await;
        let err = store
            .create_incident(NewIncident::new(GeoPoint::new(91.0, 0.0), TriageType::General))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_REQUEST");
    }
}
