//! Typed client for the provider backend REST API.

pub mod api;
pub mod error;
pub mod http;
pub mod portal;
pub mod session;

pub use error::{extract_detail, ApiError};
pub use http::{ApiClient, ClientConfig, ListResponse};
pub use portal::Portal;
pub use session::{
    FileSessionStore, MemorySessionStore, PersistedSession, Session, SessionPhase, SessionStore,
    SessionStoreError,
};

pub const CRATE_NAME: &str = "portal-client";
