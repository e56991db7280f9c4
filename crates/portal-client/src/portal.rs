//! Authenticated calls and the one place expired access tokens are handled.

use std::sync::Arc;

use portal_core::{validate_login, AuthTokens, User};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::http::{ApiClient, ListResponse};
use crate::session::Session;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// An [`ApiClient`] bound to one [`Session`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Portal {
    client: ApiClient,
    session: Arc<Session>,
}

impl Portal {
    pub fn new(client: ApiClient, session: Arc<Session>) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Validates the credentials locally, then signs in and loads the user.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        validate_login(email, password)?;

        self.session.begin_login().await;
        let body = json!({ "email": email.trim(), "password": password });
        let result: Result<User, ApiError> = async {
            let resp: LoginResponse = self
                .client
                .call(Method::POST, "/api/auth/login/", Some(&body))
                .await?;
            self.session
                .set_tokens(AuthTokens {
                    access: resp.access,
                    refresh: resp.refresh,
                })
                .await;
            match resp.user {
                Some(user) => Ok(user),
                None => self.get("/api/auth/me/").await,
            }
        }
        .await;

        match result {
            Ok(user) => {
                info!(user_id = user.id, "signed in");
                self.session.complete_login(user.clone()).await;
                Ok(user)
            }
            Err(err) => {
                self.session.clear().await;
                Err(err)
            }
        }
    }

    pub async fn logout(&self) {
        self.session.clear().await;
        info!("signed out");
    }

    /// `GET /api/auth/me/`, also refreshing the cached user.
    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.get("/api/auth/me/").await?;
        self.session.set_user(user.clone()).await;
        Ok(user)
    }

    /// The cached user, fetched once if the session only has tokens.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        match self.session.user().await {
            Some(user) => Ok(user),
            None => self.me().await,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub(crate) async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let list: ListResponse<T> = self.get(path).await?;
        Ok(list.into_vec())
    }

    pub(crate) async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body)).await
    }

    pub(crate) async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// Sends with the current access token. A 401 triggers one refresh and
    /// one retry; a second 401 or a failed refresh ends the session.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<T, ApiError> {
        let token = self
            .session
            .access_token()
            .await
            .ok_or(ApiError::SessionExpired)?;

        let resp = self
            .client
            .send(method.clone(), path, Some(&token), body.as_ref())
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return ApiClient::decode(resp).await;
        }

        let fresh = self.refresh_after_unauthorized(&token).await?;
        let resp = self
            .client
            .send(method, path, Some(&fresh), body.as_ref())
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(path, "still unauthorized after refresh; ending session");
            self.session.clear().await;
            return Err(ApiError::SessionExpired);
        }
        ApiClient::decode(resp).await
    }

    async fn refresh_after_unauthorized(&self, stale_access: &str) -> Result<String, ApiError> {
        let _gate = self.session.refresh_gate().lock().await;

        // Another caller may have refreshed while we waited on the gate.
        match self.session.access_token().await {
            Some(current) if current != stale_access => return Ok(current),
            Some(_) => {}
            None => return Err(ApiError::SessionExpired),
        }

        let Some(refresh) = self.session.refresh_token().await else {
            return Err(ApiError::SessionExpired);
        };

        self.session.begin_refresh().await;
        let body = json!({ "refresh": refresh });
        match self
            .client
            .call::<RefreshResponse>(Method::POST, "/api/auth/refresh/", Some(&body))
            .await
        {
            Ok(resp) => {
                let tokens = AuthTokens {
                    access: resp.access,
                    refresh: resp.refresh.unwrap_or(refresh),
                };
                let access = tokens.access.clone();
                self.session.complete_refresh(tokens).await;
                info!("access token refreshed");
                Ok(access)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; ending session");
                self.session.clear().await;
                Err(ApiError::SessionExpired)
            }
        }
    }
}
