//! Sessions and transient notices
//!
//! Each browser carries a signed `lrms_session` cookie naming a server-side
//! session. A session holds the logged-in identity (if any) and a queue of
//! notices that are shown once on the next rendered page, then dropped.
//!
//! The cookie is issued by [`session_middleware`]; handlers obtain the id
//! through the [`SessionId`] extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use lrms_common::credentials::{session_token, verify_session_token};
use lrms_common::db::Role;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "lrms_session";

/// Authenticated user attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

/// Anonymous sessions only carry notices for the next page; drop them quickly
const ANONYMOUS_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Logged-in sessions idle longer than this are logged out
const LOGGED_IN_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Minimum time between idle sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Session {
    identity: Option<Identity>,
    notices: Vec<String>,
    last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            identity: None,
            notices: Vec::new(),
            last_seen: Instant::now(),
        }
    }
}

impl Session {
    fn idle_timeout(&self) -> Duration {
        if self.identity.is_some() {
            LOGGED_IN_IDLE_TIMEOUT
        } else {
            ANONYMOUS_IDLE_TIMEOUT
        }
    }
}

#[derive(Debug)]
struct SessionTable {
    sessions: HashMap<Uuid, Session>,
    last_sweep: Instant,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }
}

impl SessionTable {
    /// Mutable session entry, created on demand and marked as seen
    fn entry(&mut self, id: &Uuid) -> &mut Session {
        let session = self.sessions.entry(*id).or_default();
        session.last_seen = Instant::now();
        session
    }

    /// Drop sessions idle past their timeout; returns how many were dropped
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_seen) < s.idle_timeout());
        self.last_sweep = now;
        before - self.sessions.len()
    }
}

/// Process-wide session table
///
/// Entries exist only while they hold an identity or undelivered notices,
/// and are swept once idle.
#[derive(Clone, Default)]
pub struct SessionStore {
    table: Arc<RwLock<SessionTable>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn identity(&self, id: &Uuid) -> Option<Identity> {
        self.table
            .read()
            .await
            .sessions
            .get(id)
            .and_then(|s| s.identity.clone())
    }

    /// Attach `identity` under a fresh session id and forget `previous`.
    ///
    /// Pending notices move to the new session. Returns the new id, whose
    /// cookie must be issued to the client.
    pub async fn log_in(&self, previous: &Uuid, identity: Identity) -> Uuid {
        let mut table = self.table.write().await;
        let notices = table
            .sessions
            .remove(previous)
            .map(|s| s.notices)
            .unwrap_or_default();

        let id = Uuid::new_v4();
        let session = table.entry(&id);
        session.identity = Some(identity);
        session.notices = notices;
        id
    }

    /// Forget everything held for the session (identity and pending notices)
    pub async fn end(&self, id: &Uuid) {
        self.table.write().await.sessions.remove(id);
    }

    /// Log out every session belonging to `username`
    pub async fn revoke_user(&self, username: &str) -> usize {
        let mut table = self.table.write().await;
        let mut revoked = 0;
        for session in table.sessions.values_mut() {
            if session
                .identity
                .as_ref()
                .is_some_and(|identity| identity.username == username)
            {
                session.identity = None;
                revoked += 1;
            }
        }
        table
            .sessions
            .retain(|_, s| s.identity.is_some() || !s.notices.is_empty());
        revoked
    }

    pub async fn push_notice(&self, id: &Uuid, notice: impl Into<String>) {
        self.table.write().await.entry(id).notices.push(notice.into());
    }

    pub async fn push_notices<I>(&self, id: &Uuid, notices: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.table.write().await.entry(id).notices.extend(notices);
    }

    /// Remove and return the pending notices; each is delivered once.
    ///
    /// An anonymous session has nothing left after this and is dropped.
    pub async fn take_notices(&self, id: &Uuid) -> Vec<String> {
        let mut table = self.table.write().await;
        let Some(session) = table.sessions.get_mut(id) else {
            return Vec::new();
        };

        let notices = std::mem::take(&mut session.notices);
        if session.identity.is_none() {
            table.sessions.remove(id);
        }
        notices
    }

    /// Mark the session as active and sweep idle sessions when one is due
    pub async fn touch(&self, id: &Uuid) {
        let mut table = self.table.write().await;
        let now = Instant::now();
        if let Some(session) = table.sessions.get_mut(id) {
            session.last_seen = now;
        }

        if now.saturating_duration_since(table.last_sweep) >= SWEEP_INTERVAL {
            let dropped = table.sweep(now);
            if dropped > 0 {
                debug!(dropped, remaining = table.sessions.len(), "Swept idle sessions");
            }
        }
    }
}

/// Session id chosen by a handler to replace the request's session.
///
/// Returned as a response extension; [`session_middleware`] issues its
/// cookie.
#[derive(Debug, Clone, Copy)]
pub struct RenewedSession(pub Uuid);

/// Session id of the current request, placed by [`session_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionId>()
            .copied()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session layer not installed"))
    }
}

/// Session middleware
///
/// Verifies the session cookie; a missing, forged or malformed cookie starts
/// a fresh session whose cookie is set on the response. A handler that
/// renews the session (login) gets the renewed id's cookie instead.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let secret = &state.config.session_secret;
    let existing = cookie_value(request.headers(), SESSION_COOKIE)
        .and_then(|token| verify_session_token(token, secret));

    let id = existing.unwrap_or_else(Uuid::new_v4);
    state.sessions.touch(&id).await;
    request.extensions_mut().insert(SessionId(id));

    let mut response = next.run(request).await;

    let issue = match response.extensions_mut().remove::<RenewedSession>() {
        Some(RenewedSession(renewed)) => Some(renewed),
        None if existing.is_none() => Some(id),
        None => None,
    };

    if let Some(id) = issue {
        debug!(session = %id, "Issuing session cookie");
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE,
            session_token(&id, secret)
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Find a cookie by name in the request's `Cookie` headers
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
