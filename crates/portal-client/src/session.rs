//! Session state: tokens, the signed-in user, and where they are persisted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use portal_core::{AuthTokens, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

/// `Anonymous → Authenticating → Authenticated → (Refreshing → Authenticated | Anonymous)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub tokens: AuthTokens,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store contents: {0}")]
    Format(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    async fn load(&self) -> Result<Option<PersistedSession>, SessionStoreError>;
    async fn save(&self, session: &PersistedSession) -> Result<(), SessionStoreError>;
    async fn clear(&self) -> Result<(), SessionStoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<PersistedSession>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<PersistedSession>, SessionStoreError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), SessionStoreError> {
        *self.inner.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        *self.inner.lock().await = None;
        Ok(())
    }
}

/// JSON file holding the tokens between CLI invocations.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<PersistedSession>, SessionStoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes to a temp file next to the target and renames it into place.
    async fn save(&self, session: &PersistedSession) -> Result<(), SessionStoreError> {
        let bytes = serde_json::to_vec_pretty(session)?;
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await?;

        let temp_path = parent.join(format!(".{}.session.tmp", Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    tokens: Option<AuthTokens>,
    user: Option<User>,
}

/// One signed-in (or not yet signed-in) user's tokens.
///
/// Shared behind an `Arc`; `refresh_gate` makes sure concurrent 401s trigger
/// a single refresh call.
#[derive(Debug)]
pub struct Session {
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            state: RwLock::new(SessionState {
                phase: SessionPhase::Anonymous,
                tokens: None,
                user: None,
            }),
            refresh_gate: Mutex::new(()),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::default()))
    }

    /// Picks up a previously persisted session. A store that cannot be read
    /// leaves the session anonymous.
    pub async fn restore(store: Arc<dyn SessionStore>) -> Self {
        let session = Self::new(store);
        match session.store.load().await {
            Ok(Some(persisted)) => {
                let mut state = session.state.write().await;
                state.phase = SessionPhase::Authenticated;
                state.tokens = Some(persisted.tokens);
                state.user = persisted.user;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "could not read stored session"),
        }
        session
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.read().await;
        state.tokens.is_some() && state.phase != SessionPhase::Anonymous
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .tokens
            .as_ref()
            .map(|t| t.access.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .tokens
            .as_ref()
            .map(|t| t.refresh.clone())
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub(crate) async fn begin_login(&self) {
        let mut state = self.state.write().await;
        state.phase = SessionPhase::Authenticating;
        state.tokens = None;
        state.user = None;
    }

    pub(crate) async fn set_tokens(&self, tokens: AuthTokens) {
        let mut state = self.state.write().await;
        state.tokens = Some(tokens);
    }

    pub(crate) async fn complete_login(&self, user: User) {
        {
            let mut state = self.state.write().await;
            state.phase = SessionPhase::Authenticated;
            state.user = Some(user);
        }
        self.persist().await;
    }

    pub(crate) async fn set_user(&self, user: User) {
        self.state.write().await.user = Some(user);
        self.persist().await;
    }

    pub(crate) fn refresh_gate(&self) -> &Mutex<()> {
        &self.refresh_gate
    }

    pub(crate) async fn begin_refresh(&self) {
        self.state.write().await.phase = SessionPhase::Refreshing;
    }

    pub(crate) async fn complete_refresh(&self, tokens: AuthTokens) {
        {
            let mut state = self.state.write().await;
            state.phase = SessionPhase::Authenticated;
            state.tokens = Some(tokens);
        }
        self.persist().await;
    }

    /// Drops tokens and user, in memory and in the store.
    pub async fn clear(&self) {
        {
            let mut state = self.state.write().await;
            state.phase = SessionPhase::Anonymous;
            state.tokens = None;
            state.user = None;
        }
        if let Err(err) = self.store.clear().await {
            warn!(error = %err, "could not clear stored session");
        }
    }

    async fn persist(&self) {
        let snapshot = {
            let state = self.state.read().await;
            state.tokens.clone().map(|tokens| PersistedSession {
                tokens,
                user: state.user.clone(),
            })
        };
        if let Some(snapshot) = snapshot {
            if let Err(err) = self.store.save(&snapshot).await {
                warn!(error = %err, "could not persist session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(access: &str) -> AuthTokens {
        AuthTokens {
            access: access.into(),
            refresh: "r-1".into(),
        }
    }

    #[tokio::test]
    async fn file_store_round_trips_and_clears() {
        let dir = tempdir().expect("tempdir");
        let store = FileSessionStore::new(dir.path().join("nested/session.json"));
        assert!(store.load().await.unwrap().is_none());

        let persisted = PersistedSession {
            tokens: tokens("a-1"),
            user: None,
        };
        store.save(&persisted).await.unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load().await.unwrap(), Some(persisted));

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn restore_marks_persisted_tokens_authenticated() {
        let store = Arc::new(MemorySessionStore::default());
        store
            .save(&PersistedSession {
                tokens: tokens("a-9"),
                user: None,
            })
            .await
            .unwrap();

        let session = Session::restore(store.clone()).await;
        assert_eq!(session.phase().await, SessionPhase::Authenticated);
        assert_eq!(session.access_token().await.as_deref(), Some("a-9"));

        session.clear().await;
        assert_eq!(session.phase().await, SessionPhase::Anonymous);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_store_leaves_session_anonymous() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"not json").unwrap();
        let session = Session::restore(Arc::new(FileSessionStore::new(&path))).await;
        assert_eq!(session.phase().await, SessionPhase::Anonymous);
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn refresh_updates_tokens_and_persists() {
        let store = Arc::new(MemorySessionStore::default());
        let session = Session::new(store.clone());
        session.set_tokens(tokens("old")).await;
        session.begin_refresh().await;
        assert_eq!(session.phase().await, SessionPhase::Refreshing);
        session.complete_refresh(tokens("new")).await;
        assert_eq!(session.phase().await, SessionPhase::Authenticated);
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.tokens.access, "new");
    }
}
