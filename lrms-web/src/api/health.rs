//! Liveness and store reachability

use axum::{extract::State, routing::get, Json, Router};
use lrms_common::Region;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when the learner store answers, `degraded` otherwise
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    /// Regions holding a workbook that awaits commit
    pub staged_regions: Vec<Region>,
}

/// GET /health
///
/// Does not require a session. The service keeps answering with the store
/// down (the dashboard has an offline mode), so this reports rather than
/// fails.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Health check: database unreachable: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        module: "lrms-web",
        version: env!("CARGO_PKG_VERSION"),
        database: if reachable { "connected" } else { "unreachable" },
        staged_regions: if reachable {
            state.pipeline.staged_regions().await
        } else {
            Vec::new()
        },
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
