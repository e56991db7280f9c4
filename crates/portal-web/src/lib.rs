//! Axum + Askama provider portal over the backend REST API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use portal_client::ApiClient;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod config;
pub mod pages;
pub mod session;
pub mod shell;

pub use config::PortalConfig;
pub use session::{SessionRegistry, SignedIn, SESSION_COOKIE};

pub const CRATE_NAME: &str = "portal-web";

pub struct AppState {
    pub client: ApiClient,
    pub sessions: SessionRegistry,
    pub assets_dir: PathBuf,
}

impl AppState {
    pub fn new(client: ApiClient, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            sessions: SessionRegistry::default(),
            assets_dir: assets_dir.into(),
        }
    }

    pub fn from_config(config: &PortalConfig) -> anyhow::Result<Self> {
        let client = ApiClient::new(&config.client_config())?;
        Ok(Self {
            sessions: config.session_registry(),
            ..Self::new(client, config.assets_dir.clone())
        })
    }
}

pub fn app(state: AppState) -> Router {
    use pages::*;

    Router::new()
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", post(auth::logout))
        .route("/", get(dashboard::index))
        .route("/provider", get(provider::show).post(provider::update))
        .route("/contracts", get(contracts::list))
        .route("/contracts/{id}", get(contracts::detail))
        .route("/contracts/{id}/offers", post(contracts::create_offer))
        .route("/service-requests", get(service_requests::list))
        .route("/service-requests/sync", post(service_requests::sync))
        .route("/service-requests/{id}", get(service_requests::detail))
        .route("/service-requests/{id}/offers", post(service_requests::create_offer))
        .route("/service-offers", get(service_offers::list))
        .route("/service-offers/{id}", get(service_offers::detail))
        .route("/service-offers/{id}/status", post(service_offers::change_status))
        .route("/service-orders", get(service_orders::list))
        .route("/service-orders/{id}", get(service_orders::detail))
        .route("/service-orders/{id}/substitution", post(service_orders::substitution))
        .route("/service-orders/{id}/extension", post(service_orders::extension))
        .route("/change-requests", get(change_requests::list))
        .route("/change-requests/{id}/decision", post(change_requests::decide))
        .route("/specialists", get(specialists::list))
        .route("/users", get(users::list))
        .route("/users/{id}", get(users::profile).post(users::update_profile))
        .route("/users/{id}/role", post(users::change_role))
        .route("/me", get(users::me))
        .route("/activity-logs", get(activity_logs::list))
        .route("/assets/static/app.css", get(app_css_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn serve(config: PortalConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(("0.0.0.0", config.web_port))
        .await
        .with_context(|| format!("binding port {}", config.web_port))?;
    info!(
        port = config.web_port,
        api = %config.api_base_url,
        "provider portal listening"
    );
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(PortalConfig::load()?).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn app_css_handler(State(state): State<Arc<AppState>>) -> Response {
    let css_path = state.assets_dir.join("app.css");
    match tokio::fs::read_to_string(&css_path).await {
        Ok(css) => ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], css).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Html("/* missing app.css */".to_string())).into_response(),
    }
}
