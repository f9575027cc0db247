//! HTTP client for the Ghost / Cloud Deploy API.
//!
//! [`GhostClient`] wraps the five `apps` endpoints. Every request is sent
//! with HTTP Basic credentials and a JSON content type, and any non-2xx
//! status is turned into a [`ClientError::Status`] carrying the code.
//! Updates and deletes send the item's etag in `If-Match`, so a stale
//! etag comes back as `412 Precondition Failed`.
//!
//! The provider talks to the API through the [`AppsApi`] trait, which
//! lets tests inject an in-memory implementation.

pub mod models;

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{header, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use models::{App, Apps, EveItemMetadata};

/// Fixed timeout applied to every API call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by [`GhostClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("Error calling the API endpoint: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("Failed call API endpoint. HTTP response code: {status}{}", detail(.message))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the Eve error body, if there was one.
        message: Option<String>,
    },

    /// The response body was not the expected JSON.
    #[error("Could not decode JSON response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request payload could not be serialized.
    #[error("Could not encode JSON request: {0}")]
    Encode(#[source] serde_json::Error),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({})", m))
        .unwrap_or_default()
}

impl ClientError {
    /// The HTTP status code, for errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The operations the provider needs from the `apps` endpoints.
#[async_trait::async_trait]
pub trait AppsApi: Send + Sync {
    /// `GET /apps`, every page.
    async fn list_apps(&self) -> Result<Apps, ClientError>;

    /// `POST /apps`
    async fn create_app(&self, app: &App) -> Result<EveItemMetadata, ClientError>;

    /// `GET /apps/{id}`
    async fn get_app(&self, id: &str) -> Result<App, ClientError>;

    /// `PATCH /apps/{id}` guarded by `If-Match: etag`.
    async fn update_app(
        &self,
        app: &App,
        id: &str,
        etag: &str,
    ) -> Result<EveItemMetadata, ClientError>;

    /// `DELETE /apps/{id}` guarded by `If-Match: etag`.
    async fn delete_app(&self, id: &str, etag: &str) -> Result<(), ClientError>;
}

/// Client for a single Ghost endpoint.
#[derive(Clone)]
pub struct GhostClient {
    endpoint: String,
    username: String,
    password: String,
    http: Client,
}

impl std::fmt::Debug for GhostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhostClient")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl GhostClient {
    /// Create a client for `endpoint` authenticating as `username`.
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            endpoint,
            username: username.into(),
            password: password.into(),
            http,
        })
    }

    /// The base URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The user requests authenticate as.
    pub fn username(&self) -> &str {
        &self.username
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&B>,
        etag: Option<&str>,
    ) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.endpoint, path);
        debug!(%method, %url, "sending request");

        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(etag) = etag {
            request = request.header(header::IF_MATCH, etag);
        }
        if let Some(payload) = payload {
            let body = serde_json::to_vec(payload).map_err(ClientError::Encode)?;
            request = request.body(body);
        }

        let response = request.send().await?;
        check_response(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(ClientError::Decode)
    }
}

#[async_trait::async_trait]
impl AppsApi for GhostClient {
    async fn list_apps(&self) -> Result<Apps, ClientError> {
        let mut path = "/apps".to_string();
        let mut visited = HashSet::from([path.clone()]);
        let mut apps = Apps::default();

        loop {
            let response = self.send::<()>(Method::GET, &path, None, None).await?;
            let page: Apps = Self::decode(response).await?;
            let next = page.next_page().map(page_path);

            apps.items.extend(page.items);
            apps.meta = page.meta;
            apps.links = page.links;

            match next {
                Some(next) if visited.insert(next.clone()) => path = next,
                _ => break,
            }
        }

        debug!(count = apps.items.len(), pages = visited.len(), "listed apps");
        Ok(apps)
    }

    async fn create_app(&self, app: &App) -> Result<EveItemMetadata, ClientError> {
        let response = self.send(Method::POST, "/apps", Some(app), None).await?;
        Self::decode(response).await
    }

    async fn get_app(&self, id: &str) -> Result<App, ClientError> {
        let path = format!("/apps/{}", id);
        let response = self.send::<()>(Method::GET, &path, None, None).await?;
        Self::decode(response).await
    }

    async fn update_app(
        &self,
        app: &App,
        id: &str,
        etag: &str,
    ) -> Result<EveItemMetadata, ClientError> {
        let path = format!("/apps/{}", id);
        let response = self
            .send(Method::PATCH, &path, Some(app), Some(etag))
            .await?;
        Self::decode(response).await
    }

    async fn delete_app(&self, id: &str, etag: &str) -> Result<(), ClientError> {
        let path = format!("/apps/{}", id);
        self.send::<()>(Method::DELETE, &path, None, Some(etag))
            .await?;
        Ok(())
    }
}

/// Request path of a pagination link. Eve links are relative to the API root.
fn page_path(href: &str) -> String {
    format!("/{}", href.trim_start_matches('/'))
}

/// Turn any non-2xx response into an error carrying the status code.
async fn check_response(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Eve reports failures as {"_status": "ERR", "_error": {"code": .., "message": ..}}
    let message = response
        .bytes()
        .await
        .ok()
        .and_then(|body| error_message(&body));

    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

fn error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("_error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
