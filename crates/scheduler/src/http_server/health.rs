use crate::clock::Clock;
use crate::error::Result;
use crate::http_server::AppState;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service and store are reachable", body = HealthResponse)),
)]
pub async fn health_v1(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    sqlx::query("SELECT 1").execute(state.store.pool()).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        now: state.clock.now(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub counts_by_status: HashMap<String, i64>,
}

#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Message counts grouped by status", body = StatsResponse)),
)]
pub async fn stats_v1(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let rows = state.store.stats().await?;
    let counts_by_status = rows
        .into_iter()
        .map(|row| (row.status.to_string(), row.count))
        .collect();
    Ok(Json(StatsResponse { counts_by_status }))
}
