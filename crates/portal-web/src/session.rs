//! Browser sessions: a cookie carrying a random id, mapped to a client session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use portal_client::{Portal, Session};
use portal_core::{RoleSet, User};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::shell::{NavContext, PageError};
use crate::AppState;

pub const SESSION_COOKIE: &str = "portal_session";

pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(8 * 60 * 60);
pub const DEFAULT_USER_REFRESH: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Entry {
    session: Arc<Session>,
    last_seen: Instant,
    user_checked: Instant,
}

/// Browser sessions by cookie id. Entries idle longer than `idle` are dropped.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    idle: Duration,
    user_refresh: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_IDLE, DEFAULT_USER_REFRESH)
    }
}

impl SessionRegistry {
    /// `user_refresh` is how long a cached user is trusted before
    /// `/api/auth/me/` is asked again.
    pub fn new(idle: Duration, user_refresh: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle,
            user_refresh,
        }
    }

    pub async fn insert(&self, session: Arc<Session>) -> Uuid {
        self.evict_stale().await;
        let id = Uuid::new_v4();
        let now = Instant::now();
        self.sessions.write().await.insert(
            id,
            Entry {
                session,
                last_seen: now,
                user_checked: now,
            },
        );
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let expired = sessions.get(id)?.last_seen.elapsed() > self.idle;
        if expired {
            sessions.remove(id);
            return None;
        }
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id).map(|e| e.session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions past the idle limit and sessions no longer signed in.
    pub async fn evict_stale(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut stale = Vec::new();
        for (id, entry) in sessions.iter() {
            if entry.last_seen.elapsed() > self.idle || !entry.session.is_authenticated().await {
                stale.push(*id);
            }
        }
        for id in &stale {
            sessions.remove(id);
        }
        if !stale.is_empty() {
            debug!(evicted = stale.len(), "dropped stale browser sessions");
        }
        stale.len()
    }

    /// True once the cached user is older than the refresh interval. The
    /// interval restarts on every `true`.
    pub async fn user_refresh_due(&self, id: &Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(entry) if entry.user_checked.elapsed() >= self.user_refresh => {
                entry.user_checked = Instant::now();
                true
            }
            _ => false,
        }
    }
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(id: Uuid) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("portal_session=; Path=/"))
}

pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("portal_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub fn to_login() -> Response {
    let mut resp = Redirect::to("/login").into_response();
    resp.headers_mut()
        .insert(header::SET_COOKIE, clear_session_cookie());
    resp
}

/// A request from a signed-in user. Anything else is redirected to `/login`.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session_id: Uuid,
    pub portal: Portal,
    pub user: User,
    pub roles: RoleSet,
}

impl SignedIn {
    pub fn nav(&self, active: &str) -> NavContext {
        NavContext::for_user(&self.user, &self.roles, active)
    }

    pub fn forbidden(&self, active: &str) -> PageError {
        PageError::forbidden(self.nav(active))
    }
}

impl FromRequestParts<Arc<AppState>> for SignedIn {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(session_id) = session_id_from_headers(&parts.headers) else {
            return Err(to_login());
        };
        let Some(session) = state.sessions.get(&session_id).await else {
            return Err(to_login());
        };
        if !session.is_authenticated().await {
            state.sessions.remove(&session_id).await;
            return Err(to_login());
        }

        let portal = Portal::new(state.client.clone(), session);
        let user = if state.sessions.user_refresh_due(&session_id).await {
            match portal.me().await {
                Err(err) if !err.is_session_expired() => {
                    warn!(error = %err, "could not re-read the current user");
                    portal.current_user().await
                }
                other => other,
            }
        } else {
            portal.current_user().await
        };
        match user {
            Ok(user) => {
                let roles = user.role_set();
                Ok(SignedIn {
                    session_id,
                    portal,
                    user,
                    roles,
                })
            }
            Err(err) => {
                warn!(error = %err, "could not load the current user");
                state.sessions.remove(&session_id).await;
                Err(to_login())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_client::{MemorySessionStore, PersistedSession, SessionStore};
    use portal_core::AuthTokens;

    #[test]
    fn session_id_is_found_among_other_cookies() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}; lang=en")).unwrap(),
        );
        assert_eq!(session_id_from_headers(&headers), Some(id));
    }

    #[test]
    fn garbage_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("portal_session=not-a-uuid"),
        );
        assert_eq!(session_id_from_headers(&headers), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn registry_insert_get_remove() {
        let registry = SessionRegistry::default();
        let id = registry.insert(Arc::new(Session::in_memory())).await;
        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(&id).await.is_some());
        assert!(registry.get(&id).await.is_none());
    }

    async fn signed_in_session() -> Arc<Session> {
        let store = Arc::new(MemorySessionStore::default());
        store
            .save(&PersistedSession {
                tokens: AuthTokens {
                    access: "a".into(),
                    refresh: "r".into(),
                },
                user: None,
            })
            .await
            .unwrap();
        Arc::new(Session::restore(store).await)
    }

    #[tokio::test]
    async fn anonymous_sessions_are_dropped_on_insert() {
        let registry = SessionRegistry::default();
        let anonymous = registry.insert(Arc::new(Session::in_memory())).await;
        let signed_in = registry.insert(signed_in_session().await).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&anonymous).await.is_none());
        assert!(registry.get(&signed_in).await.is_some());
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let registry = SessionRegistry::new(Duration::from_millis(20), DEFAULT_USER_REFRESH);
        let old = registry.insert(signed_in_session().await).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        registry.insert(signed_in_session().await).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&old).await.is_none());
    }

    #[tokio::test]
    async fn user_refresh_comes_due_after_the_interval() {
        let registry = SessionRegistry::new(DEFAULT_SESSION_IDLE, Duration::from_millis(20));
        let id = registry.insert(signed_in_session().await).await;
        assert!(!registry.user_refresh_due(&id).await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(registry.user_refresh_due(&id).await);
        assert!(!registry.user_refresh_due(&id).await);
        assert!(!registry.user_refresh_due(&Uuid::new_v4()).await);
    }
}
