//! [`PagerDutyApi`] over the PagerDuty REST API v2.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde_json::json;
use tracing::{debug, warn};

use super::{
    check_http_response, parse_page, parse_single, reassign_body, status_update_body, ApiError,
    IncidentQuery, PagerDutyApi, DEFAULT_API_URL,
};
use crate::record::Record;

/// Page size requested from list endpoints.
pub const PAGE_LIMIT: usize = 100;

/// Default number of attempts for a request failing at the transport level.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const ACCEPT: &str = "application/vnd.pagerduty+json;version=2";
const RETRY_BASE_DELAY_MS: u64 = 500;

/// HTTP client for one PagerDuty account.
pub struct HttpPagerDuty {
    /// Base URL for the API.
    #[doc(hidden)]
    pub base_url: String,
    api_key: String,
    from_email: String,
    max_attempts: u32,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpPagerDuty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPagerDuty")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("from_email", &self.from_email)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl HttpPagerDuty {
    /// Create a client authenticating with `api_key`; write requests are
    /// attributed to `from_email`.
    pub fn new(api_key: String, from_email: String) -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_owned(),
            api_key,
            from_email,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Bound transport-level retries; values below 1 are treated as 1.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.client
            .request(method, url)
            .header("Authorization", format!("Token token={}", self.api_key))
            .header("Accept", ACCEPT)
            .header("From", &self.from_email)
    }

    /// Send `request`, retrying connect and timeout failures with a linear
    /// backoff.
    async fn execute(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let mut attempt: u32 = 1;
        loop {
            let Some(this_try) = request.try_clone() else {
                let response = request.send().await?;
                return check_http_response(response).await;
            };
            match this_try.send().await {
                Ok(response) => return check_http_response(response).await,
                Err(e) if attempt < self.max_attempts && (e.is_connect() || e.is_timeout()) => {
                    let delay =
                        Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(u64::from(attempt)));
                    warn!(attempt, error = %e, ?delay, "PagerDuty request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Fetch every page of a list endpoint.
    async fn list_all(
        &self,
        path: &str,
        key: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Record>, ApiError> {
        let mut offset: usize = 0;
        let mut records = Vec::new();
        loop {
            let mut query = params.to_vec();
            query.push(("limit".to_owned(), PAGE_LIMIT.to_string()));
            query.push(("offset".to_owned(), offset.to_string()));

            let body = self
                .execute(self.request(Method::GET, path).query(&query))
                .await?;
            let (page, more) = parse_page(&body, key)?;
            let fetched = page.len();
            records.extend(page);
            debug!(path, offset, fetched, more, "fetched page");

            if !more || fetched == 0 {
                return Ok(records);
            }
            offset = offset.saturating_add(fetched);
        }
    }
}

#[async_trait]
impl PagerDutyApi for HttpPagerDuty {
    async fn me(&self) -> Result<Record, ApiError> {
        let body = self.execute(self.request(Method::GET, "users/me")).await?;
        parse_single(&body, "user")
    }

    async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Record>, ApiError> {
        self.list_all("incidents", "incidents", &query.to_params())
            .await
    }

    async fn get_incident(&self, id: &str) -> Result<Record, ApiError> {
        let body = self
            .execute(self.request(Method::GET, &format!("incidents/{id}")))
            .await?;
        parse_single(&body, "incident")
    }

    async fn incident_alerts(&self, id: &str) -> Result<Vec<Record>, ApiError> {
        self.list_all(&format!("incidents/{id}/alerts"), "alerts", &[])
            .await
    }

    async fn update_status(&self, incidents: &[Record], status: &str) -> Result<(), ApiError> {
        if incidents.is_empty() {
            return Ok(());
        }
        let body = status_update_body(incidents, status)?;
        self.execute(self.request(Method::PUT, "incidents").json(&body))
            .await?;
        debug!(count = incidents.len(), status, "incidents updated");
        Ok(())
    }

    async fn snooze(&self, incident_id: &str, duration_secs: u64) -> Result<(), ApiError> {
        let body = json!({ "duration": duration_secs });
        self.execute(
            self.request(Method::POST, &format!("incidents/{incident_id}/snooze"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn reassign(&self, incident_id: &str, user_ids: &[String]) -> Result<(), ApiError> {
        let body = reassign_body(incident_id, user_ids);
        self.execute(self.request(Method::PUT, "incidents").json(&body))
            .await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<Record>, ApiError> {
        self.list_all("users", "users", &[]).await
    }
}
