//! Login, registration and logout

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::Page;
use crate::db::accounts;
use crate::error::LoginError;
use crate::gate::Authenticated;
use crate::session::{Identity, RenewedSession, SessionId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// GET /
pub async fn home() -> Redirect {
    Redirect::to("/login")
}

/// GET /login
pub async fn login_page(State(state): State<AppState>, session: SessionId) -> Page<Value> {
    let role = state.sessions.identity(&session.0).await.map(|i| i.role);
    Page::new("login", json!({})).role(role).render(&state, session).await
}

/// POST /login
///
/// A successful login moves the identity to a new session id.
pub async fn login(
    State(state): State<AppState>,
    session: SessionId,
    Form(form): Form<CredentialsForm>,
) -> Response {
    match accounts::authenticate(&state.db, &form.username, &form.password).await {
        Ok(account) => {
            info!(username = %account.username, "Logged in");
            let renewed = state
                .sessions
                .log_in(
                    &session.0,
                    Identity {
                        username: account.username,
                        role: account.role,
                    },
                )
                .await;
            (Extension(RenewedSession(renewed)), Redirect::to("/dashboard")).into_response()
        }
        Err(e) => {
            if let LoginError::Store(ref cause) = e {
                warn!(username = %form.username, "Login failed: {}", cause);
            }
            state.sessions.push_notice(&session.0, e.to_string()).await;
            Redirect::to("/login").into_response()
        }
    }
}

/// GET /register
pub async fn register_page(State(state): State<AppState>, session: SessionId) -> Page<Value> {
    Page::new("register", json!({})).render(&state, session).await
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    session: SessionId,
    Form(form): Form<CredentialsForm>,
) -> Redirect {
    match accounts::register(&state.db, &form.username, &form.password).await {
        Ok(()) => {
            state
                .sessions
                .push_notice(&session.0, "Account request submitted. Await admin approval.")
                .await;
            Redirect::to("/login")
        }
        Err(e) => {
            state.sessions.push_notice(&session.0, e.to_string()).await;
            Redirect::to("/register")
        }
    }
}

/// GET /logout
pub async fn logout(
    State(state): State<AppState>,
    session: SessionId,
    Authenticated(identity): Authenticated,
) -> Redirect {
    state.sessions.end(&session.0).await;
    state.sessions.push_notice(&session.0, "Logged out successfully").await;
    info!(username = %identity.username, "Logged out");
    Redirect::to("/login")
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
}
