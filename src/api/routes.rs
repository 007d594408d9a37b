use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{HealthState, LatencyStats};
use crate::catalog::{catalog, CatalogResponse};
use crate::error::AppError;
use crate::screener::ScreeningService;
use crate::types::{ScanResult, StrategyConfig};

#[derive(Clone)]
pub struct ApiState {
    pub screener: Arc<dyn ScreeningService>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub model: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/scan", post(post_scan))
        .route("/catalog", get(get_catalog))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub scans_started: u64,
    pub scans_failed: u64,
    pub in_flight: u64,
    pub last_scan_at_ms: Option<u64>,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatencyResponse {
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub sample_count: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn post_scan(
    State(state): State<ApiState>,
    body: Result<Json<StrategyConfig>, JsonRejection>,
) -> Result<Json<ScanResult>, AppError> {
    let Json(config) = body.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    state.health.scan_started();
    let started = Instant::now();
    let outcome = state.screener.request_screening(&config).await;
    state.latency.record(started.elapsed());
    state.health.scan_finished(outcome.is_ok(), now_ms());

    match outcome {
        Ok(result) => {
            info!(
                records = result.records.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "POST /scan ok"
            );
            Ok(Json(result))
        }
        Err(e) => {
            warn!(kind = %e.kind(), error = %e, "POST /scan failed");
            Err(e.into())
        }
    }
}

async fn get_catalog() -> Json<CatalogResponse> {
    Json(catalog())
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last = state.health.last_scan_at_ms();
    Json(HealthResponse {
        scans_started: state.health.scans_started(),
        scans_failed: state.health.scans_failed(),
        in_flight: state.health.in_flight(),
        last_scan_at_ms: (last > 0).then_some(last),
        model: state.model.clone(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let s = state.latency.summary();
    Json(LatencyResponse {
        p50_ms: s.p50_ms,
        p95_ms: s.p95_ms,
        p99_ms: s.p99_ms,
        sample_count: s.samples,
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
