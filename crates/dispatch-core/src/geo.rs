//! Great-circle geometry on WGS84 coordinates.
//!
//! Distances use the haversine formula on a spherical earth, which is
//! accurate to well under one percent at city scale. Interpolation is
//! linear in latitude/longitude between adjacent route points; route
//! points are dense enough that the difference from a true geodesic is
//! negligible.

use dispatch_types::GeoPoint;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Initial bearing from `a` to `b`, in degrees clockwise from north
/// (`[0, 360)`).
pub fn bearing_degrees(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Point at fraction `t` of the way from `a` to `b`. `t` outside
/// `[0, 1]` yields the nearer endpoint.
pub fn interpolate(a: GeoPoint, b: GeoPoint, t: f64) -> GeoPoint {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    GeoPoint::new(
        (b.lat - a.lat).mul_add(t, a.lat),
        (b.lng - a.lng).mul_add(t, a.lng),
    )
}

/// Point reached by travelling `distance_m` from `origin` on the given
/// initial bearing.
pub fn destination(origin: GeoPoint, distance_m: f64, bearing_deg: f64) -> GeoPoint {
    let delta = distance_m / EARTH_RADIUS_METERS;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lng1 = origin.lng.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lng2 = lng1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(
        lat2.to_degrees(),
        (lng2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0,
    )
}

/// `segments + 1` evenly spaced points from `a` to `b`, endpoints included.
pub fn densify(a: GeoPoint, b: GeoPoint, segments: u32) -> Vec<GeoPoint> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| interpolate(a, b, f64::from(i) / f64::from(segments)))
        .collect()
}

/// Seconds needed to cover `distance_m` at `speed_kmh`, rounded up.
pub fn travel_seconds(distance_m: f64, speed_kmh: f64) -> u32 {
    if speed_kmh <= 0.0 {
        return u32::MAX;
    }
    seconds_from_f64(distance_m * 3.6 / speed_kmh)
}

/// Convert a non-negative number of seconds to `u32`, rounding up and
/// saturating.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn seconds_from_f64(seconds: f64) -> u32 {
    if seconds.is_nan() || seconds <= 0.0 {
        0
    } else if seconds >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        seconds.ceil() as u32
    }
}

// ---------------------------------------------------------------------------
// Polyline
// ---------------------------------------------------------------------------

/// An ordered route with precomputed cumulative distances, for locating
/// the point at a given fraction of the total length.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    points: Vec<GeoPoint>,
    cumulative: Vec<f64>,
}

impl Polyline {
    /// Build a polyline. An empty input yields a polyline with no length
    /// whose every position is `fallback`.
    pub fn new(points: Vec<GeoPoint>, fallback: GeoPoint) -> Self {
        let points = if points.is_empty() {
            vec![fallback]
        } else {
            points
        };

        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(0.0);
        for pair in points.windows(2) {
            if let [a, b] = pair {
                total += haversine_meters(*a, *b);
                cumulative.push(total);
            }
        }

        Self { points, cumulative }
    }

    /// Total length in meters.
    pub fn length_meters(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// First point.
    pub fn start(&self) -> Option<GeoPoint> {
        self.points.first().copied()
    }

    /// Last point.
    pub fn end(&self) -> Option<GeoPoint> {
        self.points.last().copied()
    }

    /// Point at `fraction` of the total length, measured along the path.
    /// `fraction` is clamped to `[0, 1]`.
    pub fn point_at(&self, fraction: f64) -> Option<GeoPoint> {
        let total = self.length_meters();
        let fraction = fraction.clamp(0.0, 1.0);
        if total <= 0.0 || fraction >= 1.0 {
            return if fraction >= 1.0 { self.end() } else { self.start() };
        }

        let target = total * fraction;
        self.points
            .windows(2)
            .zip(self.cumulative.windows(2))
            .find_map(|(segment, distances)| match (segment, distances) {
                ([a, b], [from, to]) if target <= *to => {
                    let span = to - from;
                    let t = if span > 0.0 { (target - from) / span } else { 1.0 };
                    Some(interpolate(*a, *b, t))
                }
                _ => None,
            })
            .or_else(|| self.end())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const KL_SENTRAL: GeoPoint = GeoPoint::new(3.1340, 101.6860);
    const KLCC: GeoPoint = GeoPoint::new(3.1579, 101.7116);

    #[test]
    fn haversine_known_distance() {
        // One degree of latitude is ~111.2 km.
        let d = haversine_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
        assert!(haversine_meters(KLCC, KLCC).abs() < f64::EPSILON);
    }

    #[test]
    fn haversine_is_symmetric() {
        let there = haversine_meters(KL_SENTRAL, KLCC);
        let back = haversine_meters(KLCC, KL_SENTRAL);
        assert!((there - back).abs() < 1e-6);
        assert!(there > 3_000.0 && there < 4_000.0, "got {there}");
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = GeoPoint::new(0.0, 0.0);
        let north = bearing_degrees(origin, GeoPoint::new(1.0, 0.0));
        let east = bearing_degrees(origin, GeoPoint::new(0.0, 1.0));
        let west = bearing_degrees(origin, GeoPoint::new(0.0, -1.0));
        assert!(north.abs() < 1e-9);
        assert!((east - 90.0).abs() < 1e-9);
        assert!((west - 270.0).abs() < 1e-9);
    }

    #[test]
    fn interpolate_clamps() {
        let mid = interpolate(KL_SENTRAL, KLCC, 0.5);
        assert!((mid.lat - 3.14595).abs() < 1e-9);
        assert_eq!(interpolate(KL_SENTRAL, KLCC, 2.0), KLCC);
        assert_eq!(interpolate(KL_SENTRAL, KLCC, -1.0), KL_SENTRAL);
    }

    #[test]
    fn destination_inverts_haversine() {
        let target = destination(KL_SENTRAL, 2_500.0, 45.0);
        let d = haversine_meters(KL_SENTRAL, target);
        assert!((d - 2_500.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn densify_includes_endpoints() {
        let points = densify(KL_SENTRAL, KLCC, 4);
        assert_eq!(points.len(), 5);
        assert_eq!(points.first().copied(), Some(KL_SENTRAL));
        assert_eq!(points.last().copied(), Some(KLCC));
    }

    #[test]
    fn travel_seconds_rounds_up() {
        // 40 km/h is 11.11 m/s.
        assert_eq!(travel_seconds(1_000.0, 40.0), 90);
        assert_eq!(travel_seconds(0.0, 40.0), 0);
        assert_eq!(travel_seconds(10.0, 0.0), u32::MAX);
    }

    #[test]
    fn polyline_point_at_follows_path() {
        let corner = GeoPoint::new(3.1340, 101.7116);
        let line = Polyline::new(vec![KL_SENTRAL, corner, KLCC], KL_SENTRAL);
        let first_leg = haversine_meters(KL_SENTRAL, corner);
        let fraction = first_leg / line.length_meters();

        let at_corner = line.point_at(fraction).unwrap();
        assert!(haversine_meters(at_corner, corner) < 1.0);
        assert_eq!(line.point_at(0.0), Some(KL_SENTRAL));
        assert_eq!(line.point_at(1.0), Some(KLCC));
    }

    #[test]
    fn empty_polyline_uses_fallback() {
        let line = Polyline::new(Vec::new(), KLCC);
        assert!(line.length_meters().abs() < f64::EPSILON);
        assert_eq!(line.point_at(0.5), Some(KLCC));
    }
}
