use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use portal_client::{Portal, Session};
use portal_core::LoginForm;
use tracing::info;

use crate::session::{self, session_cookie, session_id_from_headers};
use crate::shell::render_html;
use crate::AppState;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    email: String,
    error: Option<String>,
}

pub async fn login_page() -> Response {
    render_html(LoginTemplate {
        email: String::new(),
        error: None,
    })
}

/// Validates locally, signs in against the backend, and starts a browser session.
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let session = Arc::new(Session::in_memory());
    let portal = Portal::new(state.client.clone(), session.clone());
    match portal.login(&form.email, &form.password).await {
        Ok(user) => {
            if let Some(previous) = session_id_from_headers(&headers) {
                state.sessions.remove(&previous).await;
            }
            let id = state.sessions.insert(session).await;
            info!(user_id = user.id, "browser session started");
            let mut resp = Redirect::to("/").into_response();
            resp.headers_mut()
                .insert(header::SET_COOKIE, session_cookie(id));
            resp
        }
        Err(err) => {
            let mut resp = render_html(LoginTemplate {
                email: form.email,
                error: Some(err.user_message()),
            });
            *resp.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            resp
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id_from_headers(&headers) {
        if let Some(session) = state.sessions.remove(&id).await {
            session.clear().await;
        }
    }
    session::to_login()
}
