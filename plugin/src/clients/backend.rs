//! HTTP client for the Music Time backend.
//!
//! Requests carry `Authorization: Bearer <jwt>` when a token is known.
//! Responses are normalized into an [`ApiResponse`]; transport failures map
//! to status `0` instead of an error so callers can fall back to the offline
//! queue without matching on error types. No request is retried here.
//!
//! # Example
//!
//! ```no_run
//! use musictime_plugin::clients::{BackendClient, HttpBackendClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), musictime_plugin::clients::ClientError> {
//!     let client = HttpBackendClient::new("https://api.software.com")?;
//!     let resp = client.get("/users/plugin/state", Some("jwt"), &[]).await;
//!     if resp.is_ok() {
//!         println!("{}", resp.data);
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ClientError;
use crate::offline::ConnectivityProbe;

/// HTTP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Path probed to decide whether the backend is reachable.
const PING_PATH: &str = "/ping";

/// Normalized backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// HTTP status, or `0` when the request never got an answer.
    pub status: u16,
    /// Response body as JSON, `Null` when empty or not JSON.
    pub data: Value,
}

impl ApiResponse {
    /// The sentinel for "no answer".
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            status: 0,
            data: Value::Null,
        }
    }

    /// Success means a real status below 300.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status != 0 && self.status < 300
    }
}

/// The backend REST surface used by the plugin.
#[async_trait]
pub trait BackendClient: ConnectivityProbe {
    async fn get(
        &self,
        path: &str,
        auth_token: Option<&str>,
        extra_headers: &[(String, String)],
    ) -> ApiResponse;

    async fn post(&self, path: &str, body: &Value, auth_token: Option<&str>) -> ApiResponse;

    async fn put(&self, path: &str, body: &Value, auth_token: Option<&str>) -> ApiResponse;

    async fn delete(&self, path: &str, body: &Value, auth_token: Option<&str>) -> ApiResponse;
}

/// [`BackendClient`] over reqwest with connection pooling.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    base_url: String,
    client: Client,
}

impl HttpBackendClient {
    /// Creates a client for `base_url` (no trailing slash needed).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, auth_token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = auth_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
    }

    async fn execute(&self, method: Method, path: &str, builder: RequestBuilder) -> ApiResponse {
        debug!(%method, path, "backend request");

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                let data = serde_json::from_str(&text).unwrap_or(Value::Null);
                if status >= 300 {
                    warn!(%method, path, status, "backend returned an error status");
                }
                ApiResponse { status, data }
            }
            Err(e) => {
                warn!(%method, path, error = %e, "backend unreachable");
                ApiResponse::unreachable()
            }
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpBackendClient {
    async fn is_online(&self) -> bool {
        let builder = self.request(Method::GET, PING_PATH, None);
        let resp = self.execute(Method::GET, PING_PATH, builder).await;
        resp.is_ok()
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn get(
        &self,
        path: &str,
        auth_token: Option<&str>,
        extra_headers: &[(String, String)],
    ) -> ApiResponse {
        let mut builder = self.request(Method::GET, path, auth_token);
        for (name, value) in extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        self.execute(Method::GET, path, builder).await
    }

    async fn post(&self, path: &str, body: &Value, auth_token: Option<&str>) -> ApiResponse {
        let builder = self.request(Method::POST, path, auth_token).json(body);
        self.execute(Method::POST, path, builder).await
    }

    async fn put(&self, path: &str, body: &Value, auth_token: Option<&str>) -> ApiResponse {
        let builder = self.request(Method::PUT, path, auth_token).json(body);
        self.execute(Method::PUT, path, builder).await
    }

    async fn delete(&self, path: &str, body: &Value, auth_token: Option<&str>) -> ApiResponse {
        let builder = self.request(Method::DELETE, path, auth_token).json(body);
        self.execute(Method::DELETE, path, builder).await
    }
}
