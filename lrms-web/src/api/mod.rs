//! HTTP handlers for lrms-web
//!
//! Pages answer with a JSON document carrying the page data, the role of
//! the logged-in account and the pending notices (each shown once). Actions
//! queue notices and answer with a `303 See Other` redirect.

pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod database;
pub mod health;
pub mod learners;

pub use accounts::account_routes;
pub use auth::auth_routes;
pub use dashboard::dashboard_routes;
pub use database::database_routes;
pub use health::health_routes;
pub use learners::learner_routes;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use lrms_common::db::Role;
use lrms_common::Region;
use serde::Serialize;

use crate::session::SessionId;
use crate::AppState;

/// Rendered page
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub page: &'static str,
    pub role: Option<Role>,
    pub notices: Vec<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Page<T> {
    pub fn new(page: &'static str, data: T) -> Self {
        Self {
            page,
            role: None,
            notices: Vec::new(),
            data,
        }
    }

    pub fn role(mut self, role: Option<Role>) -> Self {
        self.role = role;
        self
    }

    /// Notices produced while building this page, shown after the queued ones
    pub fn warnings<I>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.notices.extend(warnings);
        self
    }

    /// Attach the session's queued notices, consuming them
    pub async fn render(mut self, state: &AppState, session: SessionId) -> Self {
        let mut notices = state.sessions.take_notices(&session.0).await;
        notices.append(&mut self.notices);
        self.notices = notices;
        self
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Parse a region selector submitted by a form
pub fn parse_region(value: &str) -> Result<Region, String> {
    value
        .parse()
        .map_err(|_| format!("Unknown region: {}", value))
}
