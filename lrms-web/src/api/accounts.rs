//! Account administration

use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{get, post},
    Router,
};
use lrms_common::db::{AccountStatus, AccountSummary};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::Page;
use crate::db::accounts;
use crate::error::AccountError;
use crate::gate::Admin;
use crate::session::SessionId;
use crate::AppState;

const PAGE_PATH: &str = "/accounts-management";

#[derive(Debug, Default, Serialize)]
pub struct AccountsManagement {
    pub users: Vec<AccountSummary>,
    pub pending_users: Vec<AccountSummary>,
}

/// GET /accounts-management
pub async fn management_page(
    State(state): State<AppState>,
    session: SessionId,
    Admin(identity): Admin,
) -> Page<AccountsManagement> {
    let (data, warnings) = match accounts::list(&state.db).await {
        Ok(all) => {
            let (users, pending_users): (Vec<_>, Vec<_>) = all
                .into_iter()
                .partition(|a| a.status == AccountStatus::Active);
            (AccountsManagement { users, pending_users }, Vec::new())
        }
        Err(e) => {
            warn!("Failed to list accounts: {}", e);
            (AccountsManagement::default(), vec![e.to_string()])
        }
    };

    Page::new("accounts_management", data)
        .role(Some(identity.role))
        .warnings(warnings)
        .render(&state, session)
        .await
}

/// POST /admin/approve/:username
pub async fn approve(
    State(state): State<AppState>,
    session: SessionId,
    Admin(_identity): Admin,
    Path(username): Path<String>,
) -> Redirect {
    match accounts::approve(&state.db, &username).await {
        Ok(()) => {
            state
                .sessions
                .push_notice(&session.0, format!("{} approved successfully", username))
                .await;
        }
        Err(AccountError::NotPending(_)) => debug!(username = %username, "Nothing to approve"),
        Err(e) => state.sessions.push_notice(&session.0, e.to_string()).await,
    }

    Redirect::to(PAGE_PATH)
}

/// POST /admin/delete/:username
pub async fn delete(
    State(state): State<AppState>,
    session: SessionId,
    Admin(_identity): Admin,
    Path(username): Path<String>,
) -> Redirect {
    match accounts::delete(&state.db, &username).await {
        Ok(()) => {
            state.sessions.revoke_user(&username).await;
            state
                .sessions
                .push_notice(&session.0, format!("Account '{}' deleted successfully", username))
                .await;
        }
        Err(AccountError::NotFound(_)) => debug!(username = %username, "Nothing to delete"),
        Err(e) => state.sessions.push_notice(&session.0, e.to_string()).await,
    }

    Redirect::to(PAGE_PATH)
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(PAGE_PATH, get(management_page))
        .route("/admin/approve/:username", post(approve))
        .route("/admin/delete/:username", post(delete))
}
