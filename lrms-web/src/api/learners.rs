//! Learner pages
//!
//! `/learners` lists the staged `learner_profiles` rows of every region;
//! `/learners/:learner_number` shows one persisted learner.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use lrms_common::db::LearnerProfile;
use lrms_common::Region;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::api::Page;
use crate::db::learners;
use crate::gate::{Admin, Authenticated};
use crate::ingest::ProfilesPreview;
use crate::session::SessionId;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LearnerList {
    pub regions: Vec<ProfilesPreview>,
}

#[derive(Debug, Serialize)]
pub struct LearnerDetail {
    pub profile: LearnerProfile,
    pub measurements: BTreeMap<&'static str, i64>,
}

/// GET /learners
pub async fn list_learners(
    State(state): State<AppState>,
    session: SessionId,
    Authenticated(identity): Authenticated,
) -> Page<LearnerList> {
    let mut regions = Vec::with_capacity(Region::ALL.len());
    for region in Region::ALL {
        regions.push(state.pipeline.preview_profiles(region).await);
    }
    let warnings: Vec<String> = regions.iter().filter_map(|r| r.warning.clone()).collect();

    Page::new("learners", LearnerList { regions })
        .role(Some(identity.role))
        .warnings(warnings)
        .render(&state, session)
        .await
}

/// GET /learners/:learner_number
pub async fn learner_detail(
    State(state): State<AppState>,
    session: SessionId,
    Authenticated(identity): Authenticated,
    Path(learner_number): Path<String>,
) -> Response {
    let loaded = match learners::get_profile(&state.db, &learner_number).await {
        Ok(Some(profile)) => learners::measurement_counts(&state.db, &learner_number)
            .await
            .map(|measurements| Some(LearnerDetail { profile, measurements })),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };

    let notice = match loaded {
        Ok(Some(detail)) => {
            return Page::new("learner", detail)
                .role(Some(identity.role))
                .render(&state, session)
                .await
                .into_response();
        }
        Ok(None) => format!("Learner {} not found", learner_number),
        Err(e) => {
            warn!(learner_number = %learner_number, "Failed to load learner: {}", e);
            format!("Failed to load learner {}: {}", learner_number, e)
        }
    };

    state.sessions.push_notice(&session.0, notice).await;
    Redirect::to("/learners").into_response()
}

/// POST /admin/learners/:learner_number/delete
pub async fn delete_learner(
    State(state): State<AppState>,
    session: SessionId,
    Admin(identity): Admin,
    Path(learner_number): Path<String>,
) -> Redirect {
    let notice = match learners::delete_profile(&state.db, &learner_number).await {
        Ok(true) => {
            info!(learner_number = %learner_number, by = %identity.username, "Learner deleted");
            format!("Learner {} deleted successfully", learner_number)
        }
        Ok(false) => format!("Learner {} not found", learner_number),
        Err(e) => format!("Failed to delete learner {}: {}", learner_number, e),
    };

    state.sessions.push_notice(&session.0, notice).await;
    Redirect::to("/learners")
}

pub fn learner_routes() -> Router<AppState> {
    Router::new()
        .route("/learners", get(list_learners))
        .route("/learners/:learner_number", get(learner_detail))
        .route("/admin/learners/:learner_number/delete", post(delete_learner))
}
