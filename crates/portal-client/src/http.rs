//! Thin reqwest wrapper: URL building, bearer auth, JSON in and out.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(20),
            user_agent: Some(format!("provider-portal/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let http = builder.build().context("building reqwest client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Sends one request. Non-2xx statuses are returned as a response, not an error,
    /// so the caller can apply the session policy before decoding.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&JsonValue>,
    ) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("api_request", %request_id, method = %method, path);

        async {
            let mut req = self
                .http
                .request(method, self.url(path))
                .header("x-request-id", request_id.to_string());
            if let Some(token) = token {
                req = req.bearer_auth(token);
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            let resp = req.send().await?;
            debug!(status = resp.status().as_u16(), "api response");
            Ok(resp)
        }
        .instrument(span)
        .await
    }

    /// Decodes a success body, or turns a non-2xx response into [`ApiError::Http`].
    pub async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::from_body(status.as_u16(), &bytes));
        }
        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        Ok(serde_json::from_slice(body)?)
    }

    /// Unauthenticated JSON call, used by the auth endpoints.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&JsonValue>,
    ) -> Result<T, ApiError> {
        let resp = self.send(method, path, None, body).await?;
        Self::decode(resp).await
    }
}

/// List endpoints answer with a bare array or a `{ "results": [...] }` page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Bare(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> ListResponse<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) => items,
            ListResponse::Paged { results } => results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let client = ApiClient::new(&ClientConfig {
            base_url: "http://backend:8000/".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://backend:8000");
        assert_eq!(
            client.url("/api/contracts/"),
            "http://backend:8000/api/contracts/"
        );
        assert_eq!(client.url("api/users/3/"), "http://backend:8000/api/users/3/");
    }

    #[test]
    fn list_envelope_accepts_both_shapes() {
        let bare: ListResponse<u32> = serde_json::from_str("[1,2,3]").unwrap();
        let paged: ListResponse<u32> =
            serde_json::from_str(r#"{"count": 2, "results": [4,5]}"#).unwrap();
        assert_eq!(bare.into_vec(), vec![1, 2, 3]);
        assert_eq!(paged.into_vec(), vec![4, 5]);
    }
}
