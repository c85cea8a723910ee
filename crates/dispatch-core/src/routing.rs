//! Routing oracle: travel routes between two points.
//!
//! Uses enum dispatch over the available providers instead of a trait
//! object, since async methods are not dyn-compatible. Every provider
//! call goes through [`RoutingOracle::calculate_route`], which counts it;
//! the ranker relies on that count to prove it stays within its budget.
//!
//! Callers that must not fail use [`RoutingOracle::route_or_estimate`],
//! which bounds the call with a timeout and falls back to a straight-line
//! estimate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dispatch_types::{GeoPoint, Route, RouteGeometry};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{RoutingBackend, RoutingConfig};
use crate::geo;
use crate::retry::RetryPolicy;

/// Spacing of interpolated points on straight-line routes.
const STRAIGHT_LINE_STEP_METERS: f64 = 250.0;

/// Upper bound on interpolated segments for one straight-line route.
const STRAIGHT_LINE_MAX_SEGMENTS: u32 = 64;

/// Errors returned by a routing provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// The request could not be sent or the response could not be read.
    #[error("routing request failed: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("routing service returned {0}")]
    Status(u16),

    /// The service found no route.
    #[error("no route: {0}")]
    NoRoute(String),

    /// The call exceeded its deadline.
    #[error("routing timed out after {0:?}")]
    Timeout(Duration),
}

impl RoutingError {
    /// Whether another attempt could succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Status(code) => *code >= 500,
            Self::NoRoute(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// A routing provider.
#[derive(Debug)]
pub enum RouteProvider {
    /// Densified straight line at a fixed speed.
    StraightLine(StraightLineRouter),
    /// OSRM-compatible HTTP service.
    Osrm(OsrmRouter),
}

/// The routing oracle shared by the ranker, the orchestrator, and the
/// route endpoint.
#[derive(Debug)]
pub struct RoutingOracle {
    provider: RouteProvider,
    fallback: StraightLineRouter,
    calls: AtomicU64,
}

impl RoutingOracle {
    /// Wrap a provider. `assumed_speed_kmh` drives the fallback estimate.
    pub const fn new(provider: RouteProvider, assumed_speed_kmh: f64) -> Self {
        Self {
            provider,
            fallback: StraightLineRouter::new(assumed_speed_kmh),
            calls: AtomicU64::new(0),
        }
    }

    /// Straight-line oracle, for tests and offline operation.
    pub const fn straight_line(assumed_speed_kmh: f64) -> Self {
        Self::new(
            RouteProvider::StraightLine(StraightLineRouter::new(assumed_speed_kmh)),
            assumed_speed_kmh,
        )
    }

    /// Build the configured provider.
    pub fn from_config(config: &RoutingConfig, retry: RetryPolicy, assumed_speed_kmh: f64) -> Self {
        let provider = match config.backend {
            RoutingBackend::StraightLine => {
                RouteProvider::StraightLine(StraightLineRouter::new(assumed_speed_kmh))
            }
            RoutingBackend::Osrm => RouteProvider::Osrm(OsrmRouter::new(
                &config.osrm_url,
                retry.with_max_attempts(config.max_attempts.max(1)),
            )),
        };
        Self::new(provider, assumed_speed_kmh)
    }

    /// Human-readable provider name for logging.
    pub const fn name(&self) -> &'static str {
        match self.provider {
            RouteProvider::StraightLine(_) => "straight-line",
            RouteProvider::Osrm(_) => "osrm",
        }
    }

    /// Number of provider calls made so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Ask the provider for a route.
    ///
    /// # Errors
    ///
    /// Returns a [`RoutingError`] when the provider fails.
    pub async fn calculate_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<Route, RoutingError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.provider {
            RouteProvider::StraightLine(router) => Ok(router.route(origin, destination)),
            RouteProvider::Osrm(router) => router.route(origin, destination).await,
        }
    }

    /// Ask the provider for a route within `timeout`, falling back to a
    /// straight-line estimate (flagged `estimated`) on failure.
    pub async fn route_or_estimate(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        timeout: Duration,
    ) -> Route {
        let outcome = tokio::time::timeout(timeout, self.calculate_route(origin, destination))
            .await
            .unwrap_or(Err(RoutingError::Timeout(timeout)));

        match outcome {
            Ok(route) => route,
            Err(err) => {
                warn!(
                    provider = self.name(),
                    error = %err,
                    "routing failed, using straight-line estimate"
                );
                self.estimate(origin, destination)
            }
        }
    }

    /// Straight-line estimate at the assumed speed, without calling the
    /// provider.
    pub fn estimate(&self, origin: GeoPoint, destination: GeoPoint) -> Route {
        let mut route = self.fallback.route(origin, destination);
        route.estimated = true;
        route
    }
}

// ---------------------------------------------------------------------------
// Straight line
// ---------------------------------------------------------------------------

/// Routes along the great-circle line at a constant speed.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineRouter {
    speed_kmh: f64,
}

impl StraightLineRouter {
    /// Create a router travelling at `speed_kmh`.
    pub const fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Compute the route.
    pub fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Route {
        let distance = geo::haversine_meters(origin, destination);
        let segments = geo::seconds_from_f64(distance / STRAIGHT_LINE_STEP_METERS)
            .clamp(1, STRAIGHT_LINE_MAX_SEGMENTS);
        let points = geo::densify(origin, destination, segments);

        Route {
            geometry: RouteGeometry::from_points(&points),
            eta_seconds: geo::travel_seconds(distance, self.speed_kmh),
            distance_meters: distance,
            estimated: false,
        }
    }
}

// ---------------------------------------------------------------------------
// OSRM
// ---------------------------------------------------------------------------

/// Client for the OSRM `route/v1/driving` endpoint.
#[derive(Debug)]
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

/// Subset of the OSRM route response.
#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: RouteGeometry,
    duration: f64,
    distance: f64,
}

impl OsrmRouter {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            retry,
        }
    }

    /// Request a route, retrying transient failures per the retry policy.
    async fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        let mut backoff = self.retry.backoff();
        loop {
            match self.request(origin, destination).await {
                Ok(route) => return Ok(route),
                Err(err) if err.is_transient() => match backoff.next() {
                    Some(delay) => {
                        debug!(error = %err, ?delay, "retrying route request");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn request(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, origin.lng, origin.lat, destination.lng, destination.lat
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RoutingError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Status(status.as_u16()));
        }

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|e| RoutingError::Http(format!("response parse failed: {e}")))?;

        parse_osrm(body)
    }
}

/// Convert an OSRM response into a [`Route`].
fn parse_osrm(body: OsrmResponse) -> Result<Route, RoutingError> {
    if body.code != "Ok" {
        return Err(RoutingError::NoRoute(
            body.message.unwrap_or(body.code),
        ));
    }
    let route = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::NoRoute("empty route list".to_owned()))?;

    Ok(Route {
        geometry: route.geometry,
        eta_seconds: geo::seconds_from_f64(route.duration),
        distance_meters: route.distance,
        estimated: false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ORIGIN: GeoPoint = GeoPoint::new(3.1390, 101.6869);
    const TARGET: GeoPoint = GeoPoint::new(3.1717, 101.7012);

    #[tokio::test]
    async fn straight_line_route_ends_at_destination() {
        let oracle = RoutingOracle::straight_line(40.0);
        let route = oracle.calculate_route(ORIGIN, TARGET).await.unwrap();

        let points = route.geometry.points();
        assert_eq!(points.first().copied(), Some(ORIGIN));
        assert_eq!(points.last().copied(), Some(TARGET));
        assert!(points.len() > 2);
        assert!(!route.estimated);
        assert_eq!(
            route.eta_seconds,
            geo::travel_seconds(route.distance_meters, 40.0)
        );
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_service_falls_back_to_estimate() {
        let retry = RetryPolicy::default().with_max_attempts(1);
        let oracle = RoutingOracle::new(
            RouteProvider::Osrm(OsrmRouter::new("http://127.0.0.1:1", retry)),
            40.0,
        );

        let route = oracle
            .route_or_estimate(ORIGIN, TARGET, Duration::from_secs(2))
            .await;
        assert!(route.estimated);
        assert!(route.eta_seconds > 0);
        assert_eq!(oracle.call_count(), 1);
    }

    #[test]
    fn osrm_body_is_parsed() {
        let body: OsrmResponse = serde_json::from_value(serde_json::json!({
            "code": "Ok",
            "routes": [{
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[101.6869, 3.139], [101.7012, 3.1717]]
                },
                "duration": 412.3,
                "distance": 4821.0
            }]
        }))
        .unwrap();

        let route = parse_osrm(body).unwrap();
        assert_eq!(route.eta_seconds, 413);
        assert_eq!(route.geometry.points().len(), 2);
    }

    #[test]
    fn osrm_error_code_is_no_route() {
        let body: OsrmResponse = serde_json::from_value(serde_json::json!({
            "code": "NoRoute",
            "message": "Impossible route between points"
        }))
        .unwrap();
        let err = parse_osrm(body).unwrap_err();
        assert!(matches!(err, RoutingError::NoRoute(_)));
        assert!(!err.is_transient());
    }
}
