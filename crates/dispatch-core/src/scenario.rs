//! Demo data: the startup hospital network and fleet, one-off scenario
//! incidents, and random incident seeding.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use dispatch_types::{
    Ambulance, AmbulanceId, AmbulanceStatus, AmbulanceType, Caller, CreateScenarioRequest,
    CreateScenarioResponse, GeoPoint, Hospital, HospitalCapability, HospitalId, HospitalStatus,
    Incident, SeedIncidentsRequest, SeedIncidentsResponse, TriageType,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::DispatchError;
use crate::geo;
use crate::orchestrator::Orchestrator;
use crate::store::{EntityStore, NewIncident};
use crate::triage::{KeywordClassifier, TriageClassifier};

// ---------------------------------------------------------------------------
// Startup network
// ---------------------------------------------------------------------------

struct HospitalSeed {
    id: u32,
    code: &'static str,
    name: &'static str,
    lat: f64,
    lng: f64,
    load: u8,
    capabilities: &'static [HospitalCapability],
    fleet: &'static [AmbulanceType],
}

const NETWORK: &[HospitalSeed] = &[
    HospitalSeed {
        id: 1,
        code: "HKL",
        name: "Hospital Kuala Lumpur",
        lat: 3.1717,
        lng: 101.7012,
        load: 75,
        capabilities: &[
            HospitalCapability::General,
            HospitalCapability::Trauma,
            HospitalCapability::Burns,
            HospitalCapability::Pediatric,
            HospitalCapability::Stroke,
        ],
        fleet: &[AmbulanceType::Als, AmbulanceType::Bls, AmbulanceType::Cct],
    },
    HospitalSeed {
        id: 2,
        code: "UMMC",
        name: "University Malaya Medical Centre",
        lat: 3.1128,
        lng: 101.6540,
        load: 60,
        capabilities: &[
            HospitalCapability::General,
            HospitalCapability::Pci,
            HospitalCapability::Stroke,
            HospitalCapability::Trauma,
            HospitalCapability::Pediatric,
        ],
        fleet: &[AmbulanceType::Als, AmbulanceType::Bls, AmbulanceType::Rrv],
    },
    HospitalSeed {
        id: 3,
        code: "IJN",
        name: "Institut Jantung Negara",
        lat: 3.1713,
        lng: 101.7077,
        load: 45,
        capabilities: &[HospitalCapability::Pci, HospitalCapability::General],
        fleet: &[AmbulanceType::Als, AmbulanceType::Cct],
    },
    HospitalSeed {
        id: 4,
        code: "HSGR",
        name: "Hospital Serdang",
        lat: 2.9766,
        lng: 101.7196,
        load: 35,
        capabilities: &[
            HospitalCapability::General,
            HospitalCapability::Pci,
            HospitalCapability::Trauma,
        ],
        fleet: &[AmbulanceType::Als, AmbulanceType::Bls],
    },
    HospitalSeed {
        id: 5,
        code: "HSB",
        name: "Hospital Sungai Buloh",
        lat: 3.2199,
        lng: 101.5830,
        load: 50,
        capabilities: &[
            HospitalCapability::General,
            HospitalCapability::Trauma,
            HospitalCapability::Burns,
        ],
        fleet: &[AmbulanceType::Als, AmbulanceType::Bls],
    },
    HospitalSeed {
        id: 6,
        code: "GKL",
        name: "Gleneagles Kuala Lumpur",
        lat: 3.1609,
        lng: 101.7391,
        load: 30,
        capabilities: &[
            HospitalCapability::General,
            HospitalCapability::Pci,
            HospitalCapability::Stroke,
        ],
        fleet: &[AmbulanceType::Als, AmbulanceType::Bls],
    },
];

/// The Kuala Lumpur hospital network.
pub fn hospitals() -> Vec<Hospital> {
    let now = Utc::now();
    NETWORK
        .iter()
        .map(|seed| Hospital {
            id: HospitalId(seed.id),
            name: seed.name.to_owned(),
            location: GeoPoint::new(seed.lat, seed.lng),
            capabilities: seed.capabilities.to_vec(),
            status: HospitalStatus::Open,
            load: seed.load,
            ambulance_count: 0,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

/// The ambulance fleet, each unit IDLE at its home hospital. Ids are
/// assigned in network order starting at 1.
pub fn fleet() -> Vec<Ambulance> {
    let now = Utc::now();
    let mut next_id = 0_u32;
    let mut units = Vec::new();
    for seed in NETWORK {
        for (index, ambulance_type) in seed.fleet.iter().enumerate() {
            next_id = next_id.saturating_add(1);
            units.push(Ambulance {
                id: AmbulanceId(next_id),
                callsign: format!(
                    "{}-{}{}",
                    seed.code,
                    ambulance_type.as_str(),
                    index.saturating_add(1)
                ),
                ambulance_type: *ambulance_type,
                status: AmbulanceStatus::Idle,
                location: GeoPoint::new(seed.lat, seed.lng),
                hospital_id: Some(HospitalId(seed.id)),
                updated_at: now,
            });
        }
    }
    units
}

/// Load the hospital network and fleet into `store`.
pub async fn seed_store(store: &EntityStore) {
    let hospitals = hospitals();
    let ambulances = fleet();
    let (hospital_count, ambulance_count) = (hospitals.len(), ambulances.len());
    for hospital in hospitals {
        store.insert_hospital(hospital).await;
    }
    for ambulance in ambulances {
        store.insert_ambulance(ambulance).await;
    }
    info!(hospital_count, ambulance_count, "store seeded");
}

// ---------------------------------------------------------------------------
// Scenario incidents
// ---------------------------------------------------------------------------

/// Create an incident from a caller's free-text report.
///
/// The text is classified best effort; without a classification the
/// incident is GENERAL with its AI fields unset.
pub async fn create_scenario(
    orchestrator: &Orchestrator,
    classifier: &TriageClassifier,
    request: CreateScenarioRequest,
) -> Result<CreateScenarioResponse, DispatchError> {
    let location = GeoPoint::new(request.lat, request.lng);
    let analysis = classifier.analyze_or_unset(&request.description).await;

    let caller = Caller {
        id: orchestrator.store().next_caller_id(),
        name: request
            .caller_name
            .unwrap_or_else(|| "Anonymous caller".to_owned()),
        phone: request.caller_phone.unwrap_or_else(|| "unknown".to_owned()),
    };

    let triage = analysis
        .as_ref()
        .and_then(|a| a.triage_type)
        .unwrap_or(TriageType::General);
    let mut new = NewIncident::new(location, triage);
    new.description = Some(request.description);
    new.is_ai_generated = true;
    new.caller_name = Some(caller.name.clone());
    new.caller_phone = Some(caller.phone.clone());
    if let Some(analysis) = &analysis {
        new.category = Some(analysis.category);
        new.severity = Some(analysis.severity);
        new.ai_confidence = Some(analysis.confidence);
    }

    let (incident, _) = orchestrator.create_incident(new).await?;
    info!(incident_id = %incident.id, caller_id = %caller.id, ?triage, "scenario incident created");
    Ok(CreateScenarioResponse {
        incident,
        user: caller,
        analysis,
    })
}

// ---------------------------------------------------------------------------
// Random seeding
// ---------------------------------------------------------------------------

const TRIAGE_TYPES: [TriageType; 6] = [
    TriageType::Stemi,
    TriageType::Stroke,
    TriageType::Trauma,
    TriageType::Burns,
    TriageType::Pediatric,
    TriageType::General,
];

const CALLERS: &[&str] = &[
    "Aisyah Rahman",
    "Tan Wei Ming",
    "Priya Nair",
    "Muhammad Hafiz",
    "Lim Mei Ling",
    "Rajesh Kumar",
];

const fn templates(triage: TriageType) -> &'static [&'static str] {
    match triage {
        TriageType::Stemi => &[
            "Man in his fifties with crushing chest pain spreading to his left arm",
            "Woman reports chest tightness and sweating after climbing stairs",
        ],
        TriageType::Stroke => &[
            "Elderly father suddenly has slurred speech and face droop",
            "Colleague has numbness on one side and cannot speak properly",
        ],
        TriageType::Trauma => &[
            "Motorcycle crash at the junction, rider bleeding from the leg",
            "Worker fell from scaffolding, possible fracture",
        ],
        TriageType::Burns => &[
            "Kitchen fire at a food stall, cook has burns on both arms",
            "Child scalded by boiling water at home",
        ],
        TriageType::Pediatric => &[
            "Toddler with high fever and difficulty breathing",
            "Baby had a seizure and is now very drowsy",
        ],
        TriageType::General => &[
            "Elderly woman feeling dizzy and weak since morning",
            "Man with persistent vomiting asking for help",
        ],
    }
}

/// Random incident generator. Seeded generators produce the same
/// sequence of incidents on every run.
#[derive(Debug)]
pub struct IncidentGenerator {
    rng: Mutex<SmallRng>,
    keywords: KeywordClassifier,
}

impl IncidentGenerator {
    /// Create a generator, deterministic when `seed` is given.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self {
            rng: Mutex::new(rng),
            keywords: KeywordClassifier::new(std::time::Duration::ZERO),
        }
    }

    /// Draw `request.count` incidents uniformly from the requested disc.
    pub fn generate(&self, request: &SeedIncidentsRequest) -> Vec<NewIncident> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let center = GeoPoint::new(request.center_lat, request.center_lng);
        let radius_m = request.radius_km * 1_000.0;

        (0..request.count)
            .map(|_| {
                // sqrt keeps the density uniform over the disc area.
                let distance = radius_m * rng.random::<f64>().sqrt();
                let bearing = rng.random_range(0.0..360.0);
                let location = geo::destination(center, distance, bearing);

                let triage = pick(&mut *rng, &TRIAGE_TYPES).unwrap_or(TriageType::General);
                let description = pick(&mut *rng, templates(triage)).unwrap_or_default();
                let caller = pick(&mut *rng, CALLERS).unwrap_or("Anonymous caller");
                let analysis = self.keywords.classify(description);

                let mut new = NewIncident::new(location, triage);
                new.description = Some(description.to_owned());
                new.category = Some(analysis.category);
                new.severity = Some(analysis.severity);
                new.caller_name = Some(caller.to_owned());
                new
            })
            .collect()
    }

    /// Generate and create incidents through `orchestrator`.
    pub async fn seed(
        &self,
        orchestrator: &Orchestrator,
        request: &SeedIncidentsRequest,
    ) -> Result<SeedIncidentsResponse, DispatchError> {
        let mut incidents: Vec<Incident> = Vec::new();
        for new in self.generate(request) {
            let (incident, _) = orchestrator.create_incident(new).await?;
            incidents.push(incident);
        }
        let created = u32::try_from(incidents.len()).unwrap_or(u32::MAX);
        info!(created, radius_km = request.radius_km, "random incidents seeded");
        Ok(SeedIncidentsResponse { created, incidents })
    }
}

fn pick<T: Copy>(rng: &mut impl Rng, items: &[T]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.random_range(0..items.len())).copied()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use dispatch_events::EventBus;

    use super::*;
    use crate::config::DispatchConfig;
    use crate::routing::RoutingOracle;

    async fn orchestrator() -> Orchestrator {
        let store = Arc::new(EntityStore::new(EventBus::new(1_024)));
        seed_store(&store).await;
        Orchestrator::new(
            store,
            Arc::new(RoutingOracle::straight_line(40.0)),
            &DispatchConfig::default(),
        )
    }

    #[test]
    fn fleet_is_homed_at_known_hospitals() {
        let hospitals = hospitals();
        let fleet = fleet();
        assert_eq!(hospitals.len(), 6);
        assert_eq!(fleet.len(), 14);
        for ambulance in &fleet {
            let home = hospitals
                .iter()
                .find(|h| Some(h.id) == ambulance.hospital_id)
                .unwrap();
            assert_eq!(ambulance.location, home.location);
            assert_eq!(ambulance.status, AmbulanceStatus::Idle);
        }
        let first: Vec<&str> = fleet.iter().take(3).map(|a| a.callsign.as_str()).collect();
        assert_eq!(first, vec!["HKL-ALS1", "HKL-BLS2", "HKL-CCT3"]);
    }

    #[test]
    fn an_als_unit_is_close_to_the_city_centre() {
        let centre = GeoPoint::new(3.1390, 101.6869);
        assert!(fleet().iter().any(|a| {
            a.ambulance_type == AmbulanceType::Als
                && geo::haversine_meters(a.location, centre) < 5_000.0
        }));
    }

    #[test]
    fn seeded_generator_is_deterministic_and_stays_in_the_disc() {
        let request = SeedIncidentsRequest {
            count: 20,
            center_lat: 3.1390,
            center_lng: 101.6869,
            radius_km: 5.0,
        };
        let first = IncidentGenerator::new(Some(7)).generate(&request);
        let second = IncidentGenerator::new(Some(7)).generate(&request);
        assert_eq!(first, second);
        assert_eq!(first.len(), 20);

        let centre = GeoPoint::new(request.center_lat, request.center_lng);
        for new in &first {
            assert!(geo::haversine_meters(centre, new.location) <= 5_001.0);
            assert!(new.description.is_some());
        }
    }

    #[tokio::test]
    async fn scenario_classifies_and_records_the_caller() {
        let orchestrator = orchestrator().await;
        let request = CreateScenarioRequest {
            lat: 3.1390,
            lng: 101.6869,
            description: "My father has crushing chest pain".to_owned(),
            caller_name: Some("Aisyah Rahman".to_owned()),
            caller_phone: None,
        };

        let response = create_scenario(&orchestrator, &TriageClassifier::keyword(), request)
            .await
            .unwrap();
        assert_eq!(response.incident.triage, TriageType::Stemi);
        assert!(response.incident.is_ai_generated);
        assert!(response.incident.recommended_hospital_id.is_some());
        assert_eq!(response.user.name, "Aisyah Rahman");
        assert_eq!(response.user.phone, "unknown");
        assert!(response.analysis.is_some());

        let again = create_scenario(
            &orchestrator,
            &TriageClassifier::keyword(),
            CreateScenarioRequest {
                lat: 3.14,
                lng: 101.69,
                description: "Someone needs help".to_owned(),
                caller_name: None,
                caller_phone: None,
            },
        )
        .await
        .unwrap();
        assert_ne!(again.user.id, response.user.id);
        assert_eq!(again.incident.triage, TriageType::General);
    }

    #[tokio::test]
    async fn seeding_creates_pending_incidents() {
        let orchestrator = orchestrator().await;
        let generator = IncidentGenerator::new(Some(1));
        let response = generator
            .seed(
                &orchestrator,
                &SeedIncidentsRequest {
                    count: 5,
                    center_lat: 3.1390,
                    center_lng: 101.6869,
                    radius_km: 3.0,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.created, 5);
        let active = orchestrator.store().list_active_incidents().await;
        assert_eq!(active.len(), 5);
    }
}
