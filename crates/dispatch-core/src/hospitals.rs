//! Destination hospital recommendation.
//!
//! ```text
//! score = 0.6 * eta_score + 0.3 * (1 - load / 100) + 0.1 * capability_bonus
//! eta_score = 1 / (1 + eta_minutes / 10)
//! ```
//!
//! ETA is the straight-line estimate at the assumed speed, so scoring
//! never waits on the routing oracle. CLOSED hospitals are excluded and
//! DIVERTING scores are halved. Hospitals without the capability the
//! triage requires are only considered when no OPEN hospital offers it.

use std::cmp::Ordering;

use dispatch_types::{GeoPoint, Hospital, HospitalRecommendation, HospitalStatus, TriageType};

use crate::geo;

/// Number of recommendations returned.
pub const MAX_RECOMMENDATIONS: usize = 3;

const ETA_WEIGHT: f64 = 0.6;
const LOAD_WEIGHT: f64 = 0.3;
const CAPABILITY_WEIGHT: f64 = 0.1;
const DIVERTING_FACTOR: f64 = 0.5;

/// Rank hospitals for a patient at `scene`. Best first, at most
/// [`MAX_RECOMMENDATIONS`].
pub fn recommend(
    hospitals: &[Hospital],
    scene: GeoPoint,
    triage: TriageType,
    assumed_speed_kmh: f64,
) -> Vec<HospitalRecommendation> {
    let required = triage.required_capability();
    let accepting: Vec<&Hospital> = hospitals
        .iter()
        .filter(|h| h.status != HospitalStatus::Closed)
        .collect();

    let capable_open = accepting
        .iter()
        .any(|h| h.status == HospitalStatus::Open && h.has_capability(required));

    let mut ranked: Vec<HospitalRecommendation> = accepting
        .into_iter()
        .filter(|h| !capable_open || h.has_capability(required))
        .map(|hospital| {
            let distance = geo::haversine_meters(scene, hospital.location);
            let eta_seconds = geo::travel_seconds(distance, assumed_speed_kmh);
            let capable = hospital.has_capability(required);
            HospitalRecommendation {
                score: score(hospital, eta_seconds, capable),
                hospital: hospital.clone(),
                eta_seconds,
                distance_meters: distance,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.hospital.id.cmp(&b.hospital.id))
    });
    ranked.truncate(MAX_RECOMMENDATIONS);
    ranked
}

fn score(hospital: &Hospital, eta_seconds: u32, capable: bool) -> f64 {
    let eta_minutes = f64::from(eta_seconds) / 60.0;
    let eta_score = 1.0 / (1.0 + eta_minutes / 10.0);
    let load_score = 1.0 - f64::from(hospital.load.min(100)) / 100.0;
    let bonus = if capable { 1.0 } else { 0.0 };

    let raw = CAPABILITY_WEIGHT.mul_add(
        bonus,
        ETA_WEIGHT.mul_add(eta_score, LOAD_WEIGHT * load_score),
    );
    if hospital.status == HospitalStatus::Diverting {
        raw * DIVERTING_FACTOR
    } else {
        raw
    }
}
