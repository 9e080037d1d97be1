//! Dashboard: persisted learner counts per region

use axum::{extract::State, routing::get, Router};
use lrms_common::Region;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::api::Page;
use crate::db::learners;
use crate::gate::Authenticated;
use crate::session::SessionId;
use crate::AppState;

/// Shown instead of counts when the learner store cannot be queried
pub const OFFLINE_NOTICE: &str = "Database not connected (offline mode)";

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub learner_counts: BTreeMap<Region, i64>,
    pub db_error: Option<&'static str>,
}

/// GET /dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    session: SessionId,
    Authenticated(identity): Authenticated,
) -> Page<Dashboard> {
    let data = match learners::count_by_region(&state.db).await {
        Ok(learner_counts) => Dashboard {
            learner_counts,
            db_error: None,
        },
        Err(e) => {
            warn!("Learner counts unavailable: {}", e);
            Dashboard {
                learner_counts: Region::ALL.iter().map(|r| (*r, 0)).collect(),
                db_error: Some(OFFLINE_NOTICE),
            }
        }
    };

    Page::new("dashboard", data)
        .role(Some(identity.role))
        .render(&state, session)
        .await
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}
