//! lrms-web library - learner records web service
//!
//! Registration with admin approval, a learner-count dashboard, regional
//! `.xlsx` ingestion (upload, validate, stage, commit) and account
//! administration over a SQLite store.

use axum::{extract::DefaultBodyLimit, middleware, Router};
use lrms_common::config::AppConfig;
use lrms_common::db::init_database;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod db;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod session;

use ingest::IngestionPipeline;
use session::SessionStore;

/// Multipart framing allowance on top of the upload ceiling
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub sessions: SessionStore,
    pub pipeline: Arc<IngestionPipeline>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig) -> Self {
        let pipeline = IngestionPipeline::new(
            db.clone(),
            config.upload_dir.clone(),
            config.max_upload_bytes,
        );

        Self {
            db,
            sessions: SessionStore::new(),
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

/// Prepare everything the service needs before serving.
///
/// Warns about development secrets, creates the upload directory, opens the
/// database (creating the schema) and seeds the root admin account.
pub async fn bootstrap(config: AppConfig) -> lrms_common::Result<AppState> {
    config.warn_development_defaults();
    config.ensure_upload_dir()?;

    let db = init_database(&config.database_url).await?;

    db::accounts::seed_root_admin(&db, &config.root_admin_username, &config.root_admin_password)
        .await
        .map_err(|e| lrms_common::Error::Internal(format!("Failed to seed root admin: {}", e)))?;

    info!(upload_dir = %config.upload_dir.display(), "Service state ready");
    Ok(AppState::new(db, config))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .merge(api::auth_routes())
        .merge(api::dashboard_routes())
        .merge(api::learner_routes())
        .merge(api::database_routes())
        .merge(api::account_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
