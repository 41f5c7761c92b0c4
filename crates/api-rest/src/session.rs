//! In-memory sessions keyed by the `osler_session` cookie.
//!
//! A session holds the clinical role a user selected, and the role's chart-signing and
//! staff-view flags. Sessions are created lazily: a cookie is only issued once something is
//! stored. Sessions idle for longer than the store's timeout are dropped.

use crate::AppState;
use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use osler_core::records::ProviderType;
use osler_core::ShardableUuid;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SESSION_COOKIE: &str = "osler_session";

/// How long an unused session is kept.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionData {
    /// The user who selected the role.
    pub username: Option<String>,
    pub clintype_id: Option<ShardableUuid>,
    pub signs_charts: bool,
    pub staff_view: bool,
}

#[derive(Debug)]
struct SessionEntry {
    data: SessionData,
    last_used: Instant,
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_timeout,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Mark a session as used. Expired sessions are removed and reported as unknown.
    fn touch(&self, id: &str) -> bool {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            if entry.last_used.elapsed() < self.idle_timeout {
                entry.last_used = Instant::now();
                return true;
            }
        }
        self.sessions.remove(id);
        false
    }

    /// Drop every idle session, returning how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.last_used.elapsed() < self.idle_timeout);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// The current request's session.
#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    store: SessionStore,
}

impl Session {
    pub fn data(&self) -> SessionData {
        self.store
            .sessions
            .get(&self.id)
            .map(|entry| entry.data.clone())
            .unwrap_or_default()
    }

    /// Store the role `username` selected, and its flags.
    pub fn select_role(&self, username: &str, role: &ProviderType) {
        self.store.sessions.insert(
            self.id.clone(),
            SessionEntry {
                data: SessionData {
                    username: Some(username.to_string()),
                    clintype_id: Some(role.id),
                    signs_charts: role.signs_charts,
                    staff_view: role.staff_view,
                },
                last_used: Instant::now(),
            },
        );
        tracing::debug!(username, role = %role.id, "clinical role selected");
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            tracing::error!("session middleware is not installed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        })
    }
}

fn cookie_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Attach a [`Session`] to every request, issuing a cookie when a new session was written.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let store = state.sessions.clone();
    let (id, known) = match cookie_session_id(req.headers()) {
        Some(id) if store.touch(&id) => (id, true),
        _ => (ShardableUuid::new().to_string(), false),
    };

    req.extensions_mut().insert(Session {
        id: id.clone(),
        store: store.clone(),
    });
    let mut resp = next.run(req).await;

    if !known && store.contains(&id) {
        let pruned = store.prune();
        if pruned > 0 {
            tracing::debug!(pruned, "idle sessions removed");
        }
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                resp.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Session cookie error: {:?}", e),
        }
    }
    resp
}
