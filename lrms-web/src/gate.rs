//! Access gate
//!
//! [`check`] decides whether a session may reach a page. Handlers ask for
//! the [`Authenticated`] or [`Admin`] extractor instead of calling it
//! directly; a denied request gets a notice and a redirect, never a handler
//! invocation.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use lrms_common::db::Role;
use tracing::debug;

use crate::session::{Identity, SessionId};
use crate::AppState;

/// Access level required by a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any logged-in account
    Authenticated,
    /// Logged-in account with the admin role
    Admin,
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotLoggedIn,
    NotAdmin,
}

impl Denial {
    pub fn notice(&self) -> &'static str {
        match self {
            Denial::NotLoggedIn => "Please login first",
            Denial::NotAdmin => "Admins only",
        }
    }

    pub fn redirect_to(&self) -> &'static str {
        match self {
            Denial::NotLoggedIn => "/login",
            Denial::NotAdmin => "/learners",
        }
    }
}

/// Outcome of [`check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Allowed(Identity),
    Denied(Denial),
}

/// Decide access for the session's identity.
///
/// The admin requirement is only evaluated after the identity check passes.
pub fn check(identity: Option<Identity>, access: Access) -> Gate {
    let identity = match identity {
        Some(identity) => identity,
        None => return Gate::Denied(Denial::NotLoggedIn),
    };

    match access {
        Access::Authenticated => Gate::Allowed(identity),
        Access::Admin if identity.role == Role::Admin => Gate::Allowed(identity),
        Access::Admin => Gate::Denied(Denial::NotAdmin),
    }
}

/// Rejection produced by the gate extractors
#[derive(Debug)]
pub enum GateRejection {
    Denied(Denial),
    /// Session middleware missing from the router
    NoSession,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            GateRejection::Denied(denial) => Redirect::to(denial.redirect_to()).into_response(),
            GateRejection::NoSession => Redirect::to("/login").into_response(),
        }
    }
}

async fn guard(parts: &mut Parts, state: &AppState, access: Access) -> Result<Identity, GateRejection> {
    let SessionId(session) = SessionId::from_request_parts(parts, state)
        .await
        .map_err(|_| GateRejection::NoSession)?;

    match check(state.sessions.identity(&session).await, access) {
        Gate::Allowed(identity) => Ok(identity),
        Gate::Denied(denial) => {
            debug!(path = %parts.uri.path(), ?denial, "Access denied");
            state.sessions.push_notice(&session, denial.notice()).await;
            Err(GateRejection::Denied(denial))
        }
    }
}

/// Extractor: any logged-in account
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        guard(parts, state, Access::Authenticated).await.map(Authenticated)
    }
}

/// Extractor: logged-in admin
#[derive(Debug, Clone)]
pub struct Admin(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        guard(parts, state, Access::Admin).await.map(Admin)
    }
}
