//! PagerDuty REST API access.
//!
//! [`PagerDutyApi`] is the seam between the command layer and the network:
//! commands only ever see plain [`Record`]s, so tests drive them with an
//! in-memory implementation while [`HttpPagerDuty`] talks to the real API.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::filters::{self, FilterError};
use crate::record::Record;

pub mod http;

pub use http::HttpPagerDuty;

/// Incident status: not yet acknowledged.
pub const STATUS_TRIGGERED: &str = "triggered";
/// Incident status: someone is on it.
pub const STATUS_ACK: &str = "acknowledged";
/// Incident status: closed.
pub const STATUS_RESOLVED: &str = "resolved";

/// Incident urgency: high.
pub const URGENCY_HIGH: &str = "high";
/// Incident urgency: low.
pub const URGENCY_LOW: &str = "low";

/// Public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.pagerduty.com";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while talking to PagerDuty.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP transport failure.
    #[error("PagerDuty request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The API key was rejected.
    #[error("PagerDuty rejected the API key (status {status}): {body}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Any other non-success status.
    #[error("PagerDuty returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Response did not have the expected shape.
    #[error("PagerDuty response parse error: {0}")]
    Parse(String),
}

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] for 401/403, [`ApiError::HttpStatus`]
/// for other non-2xx codes, and [`ApiError::Request`] if the body cannot be
/// read.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ApiError::Unauthorized {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    if !status.is_success() {
        return Err(ApiError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    // PagerDuty echoes tokens in some error payloads.
    if let Ok(regex) = Regex::new(r"(?i)token token=[A-Za-z0-9_+\-]+") {
        sanitized = regex.replace_all(&sanitized, "token token=[REDACTED]").into_owned();
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Server-side filter for incident listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentQuery {
    /// Only incidents assigned to these users; empty means everyone.
    pub user_ids: Vec<String>,
    /// Only incidents in these statuses.
    pub statuses: Vec<String>,
    /// Only incidents with these urgencies.
    pub urgencies: Vec<String>,
}

impl IncidentQuery {
    /// Every open incident, whoever it is assigned to.
    pub fn open() -> Self {
        Self {
            user_ids: Vec::new(),
            statuses: vec![STATUS_TRIGGERED.to_owned(), STATUS_ACK.to_owned()],
            urgencies: vec![URGENCY_HIGH.to_owned(), URGENCY_LOW.to_owned()],
        }
    }

    /// Query-string pairs in PagerDuty's `key[]=value` list form.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let lists = [
            ("user_ids[]", &self.user_ids),
            ("statuses[]", &self.statuses),
            ("urgencies[]", &self.urgencies),
        ];
        lists
            .into_iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.to_owned(), v.clone())))
            .collect()
    }
}

/// Body of a bulk status update: one incident reference per record.
#[doc(hidden)]
pub fn status_update_body(incidents: &[Record], status: &str) -> Result<Value, ApiError> {
    let refs = incidents
        .iter()
        .map(|incident| {
            let id = incident
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::Parse("incident record has no string 'id'".to_owned()))?;
            Ok(json!({ "id": id, "type": "incident_reference", "status": status }))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;
    Ok(json!({ "incidents": refs }))
}

/// Body of a reassignment to `user_ids`.
#[doc(hidden)]
pub fn reassign_body(incident_id: &str, user_ids: &[String]) -> Value {
    let assignments: Vec<Value> = user_ids
        .iter()
        .map(|uid| json!({ "assignee": { "id": uid, "type": "user_reference" } }))
        .collect();
    json!({
        "incidents": [{
            "id": incident_id,
            "type": "incident_reference",
            "assignments": assignments,
        }]
    })
}

/// Records and the `more` flag from one page of a list endpoint.
#[doc(hidden)]
pub fn parse_page(body: &str, key: &str) -> Result<(Vec<Record>, bool), ApiError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ApiError::Parse(format!("invalid JSON: {e}")))?;
    let items = value
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Parse(format!("response has no '{key}' array")))?;
    let records = items
        .iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record.clone()),
            _ => Err(ApiError::Parse(format!("'{key}' contains a non-object item"))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let more = value.get("more").and_then(Value::as_bool).unwrap_or(false);
    Ok((records, more))
}

/// The object stored under `key` in a single-resource response.
#[doc(hidden)]
pub fn parse_single(body: &str, key: &str) -> Result<Record, ApiError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ApiError::Parse(format!("invalid JSON: {e}")))?;
    match value.get(key) {
        Some(Value::Object(record)) => Ok(record.clone()),
        _ => Err(ApiError::Parse(format!("response has no '{key}' object"))),
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Operations the command layer needs from PagerDuty.
///
/// Implementations must be `Send + Sync` so a client can be shared across
/// tasks.
#[async_trait]
pub trait PagerDutyApi: Send + Sync {
    /// The user owning the API key.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn me(&self) -> Result<Record, ApiError>;

    /// Every incident matching `query`, across all pages.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Record>, ApiError>;

    /// A single incident by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn get_incident(&self, id: &str) -> Result<Record, ApiError>;

    /// Alerts grouped under an incident.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn incident_alerts(&self, id: &str) -> Result<Vec<Record>, ApiError>;

    /// Move `incidents` to `status` in one bulk request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn update_status(&self, incidents: &[Record], status: &str) -> Result<(), ApiError>;

    /// Snooze an acknowledged incident for `duration_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn snooze(&self, incident_id: &str, duration_secs: u64) -> Result<(), ApiError>;

    /// Replace the assignees of an incident.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn reassign(&self, incident_id: &str, user_ids: &[String]) -> Result<(), ApiError>;

    /// Every user in the account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on API, network, or parse failure.
    async fn list_users(&self) -> Result<Vec<Record>, ApiError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Users whose `key` contains `query`, case-insensitively.
///
/// # Errors
///
/// Returns [`FilterError`] when a user lacks `key` or it is not a string.
pub fn search_users(users: Vec<Record>, query: &str, key: &str) -> Result<Vec<Record>, FilterError> {
    filters::apply(users, &[filters::in_str(key, query)])
}

/// The `id` of every user that has one.
pub fn user_ids(users: &[Record]) -> Vec<String> {
    users
        .iter()
        .filter_map(|u| u.get("id").and_then(Value::as_str).map(str::to_owned))
        .collect()
}
