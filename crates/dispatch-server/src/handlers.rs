//! General endpoint handlers: status page, health, snapshot, routing,
//! and text triage.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/health` | Liveness plus stream position |
//! | `GET` | `/api/snapshot` | Full state snapshot |
//! | `POST` | `/routes/calculate` | Route between two points |
//! | `POST` | `/api/ai/analyze` | Classify free text |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use dispatch_core::DispatchError;
use dispatch_types::{
    AmbulanceStatus, AnalyzeTextRequest, ApiResponse, CalculateRouteRequest,
    CalculateRouteResponse, Snapshot, TriageAnalysis,
};
use serde::Serialize;
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::extract::{ApiJson, DispatcherId};
use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
    /// Sequence number of the last published event.
    pub seq: u64,
    /// Open dispatcher sessions.
    pub connected_sessions: usize,
    /// Running movement simulations.
    pub active_simulations: u32,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing engine status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store().snapshot().await;
    let seq = snapshot.seq;
    let active = snapshot
        .incidents
        .iter()
        .filter(|i| !i.status.is_terminal())
        .count();
    let idle = snapshot
        .ambulances
        .iter()
        .filter(|a| a.status == AmbulanceStatus::Idle)
        .count();
    let fleet = snapshot.ambulances.len();
    let hospitals = snapshot.hospitals.len();
    let simulations = state.orchestrator.status().active_simulations;
    let sessions = state.sessions.count();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Dispatch Engine</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #f85149; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Dispatch Engine</h1>
    <p class="subtitle">Emergency dispatch coordination</p>

    <div>
        <div class="metric"><div class="label">Seq</div><div class="value">{seq}</div></div>
        <div class="metric"><div class="label">Active incidents</div><div class="value">{active}</div></div>
        <div class="metric"><div class="label">Idle ambulances</div><div class="value">{idle} / {fleet}</div></div>
        <div class="metric"><div class="label">Hospitals</div><div class="value">{hospitals}</div></div>
        <div class="metric"><div class="label">Simulations</div><div class="value">{simulations}</div></div>
        <div class="metric"><div class="label">Dispatchers</div><div class="value">{sessions}</div></div>
    </div>

    <h3>API</h3>
    <ul>
        <li><a href="/health">/health</a></li>
        <li><a href="/api/snapshot">/api/snapshot</a></li>
        <li><a href="/incidents/active">/incidents/active</a></li>
        <li><a href="/ambulances">/ambulances</a></li>
        <li><a href="/hospitals">/hospitals</a></li>
        <li><a href="/hazards">/hazards</a></li>
        <li><a href="/api/simulation/status">/api/simulation/status</a></li>
        <li>/ws/dispatch (WebSocket)</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness, current stream position, and session counts.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        seq: state.store().bus().current_seq(),
        connected_sessions: state.sessions.count(),
        active_simulations: state.orchestrator.status().active_simulations,
    })
}

// ---------------------------------------------------------------------------
// GET /api/snapshot
// ---------------------------------------------------------------------------

/// The full current state, tagged with the sequence number it reflects.
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Snapshot>> {
    Json(ApiResponse::ok(state.store().snapshot().await))
}

// ---------------------------------------------------------------------------
// POST /routes/calculate
// ---------------------------------------------------------------------------

/// Route between two points. Falls back to a straight-line estimate
/// (flagged `estimated`) when the routing provider fails.
pub async fn calculate_route(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CalculateRouteRequest>,
) -> Result<Json<ApiResponse<CalculateRouteResponse>>, ApiError> {
    body.validate()?;
    let orchestrator = &state.orchestrator;
    let route = orchestrator
        .oracle()
        .route_or_estimate(body.origin, body.destination, orchestrator.routing_timeout())
        .await;
    Ok(Json(ApiResponse::ok(CalculateRouteResponse { route })))
}

// ---------------------------------------------------------------------------
// POST /api/ai/analyze
// ---------------------------------------------------------------------------

/// Classify free text with the configured triage backend.
pub async fn analyze_text(
    State(state): State<Arc<AppState>>,
    dispatcher: DispatcherId,
    ApiJson(body): ApiJson<AnalyzeTextRequest>,
) -> Result<Json<ApiResponse<TriageAnalysis>>, ApiError> {
    body.validate()?;
    let analysis = state
        .classifier
        .analyze(&body.text)
        .await
        .map_err(|e| DispatchError::UpstreamUnavailable(e.to_string()))?;
    info!(
        %dispatcher,
        backend = state.classifier.name(),
        category = ?analysis.category,
        confidence = analysis.confidence,
        "text analysed"
    );
    Ok(Json(ApiResponse::ok(analysis)))
}
