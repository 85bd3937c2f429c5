//! HTTP client for the Intercom REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bulk::Job;
use crate::config::DEFAULT_API_BASE_URL;
use crate::error::{IntercomError, Result};
use crate::payload::{BulkRequest, EventPayload};

/// Operations this crate needs from Intercom.
#[async_trait]
pub trait IntercomApi: Send + Sync {
    /// Submit a bulk user job.
    async fn bulk_users(&self, request: &BulkRequest) -> Result<Job>;

    /// Record a single event.
    async fn create_event(&self, event: &EventPayload) -> Result<()>;

    /// Fetch the current state of a bulk job.
    async fn job(&self, id: &str) -> Result<Job>;

    /// Fetch the error feed of a bulk job.
    async fn job_errors(&self, id: &str) -> Result<serde_json::Value>;
}

/// reqwest-backed Intercom client authenticated with a personal access token.
pub struct IntercomClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl IntercomClient {
    /// Create a client for the public Intercom API.
    pub fn new(access_token: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| IntercomError::config("Access token contains invalid header characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: Client::new(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            headers,
        })
    }

    /// Point the client at a different API host.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(method, path, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(method = %method, path, "Calling Intercom API");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.headers.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            debug!(method = %method, path, status = %status, "Intercom API call succeeded");
            Ok(text)
        } else {
            warn!(
                method = %method,
                path,
                status = %status,
                body = %text,
                "Intercom API request failed"
            );
            Err(IntercomError::Api {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

#[async_trait]
impl IntercomApi for IntercomClient {
    async fn bulk_users(&self, request: &BulkRequest) -> Result<Job> {
        self.request(Method::POST, "/bulk/users", Some(request)).await
    }

    async fn create_event(&self, event: &EventPayload) -> Result<()> {
        // Intercom answers 202 with an empty body
        self.send(Method::POST, "/events", Some(event)).await?;
        Ok(())
    }

    async fn job(&self, id: &str) -> Result<Job> {
        self.request::<(), _>(Method::GET, &format!("/jobs/{id}"), None)
            .await
    }

    async fn job_errors(&self, id: &str) -> Result<serde_json::Value> {
        self.request::<(), _>(Method::GET, &format!("/jobs/{id}/error"), None)
            .await
    }
}
