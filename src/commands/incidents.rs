//! Incident listing, presentation and actions.

use serde_json::Value;
use tracing::{debug, info};

use super::{resolve_user_ids, select_by_ids, CommandError};
use crate::filters::{not_regexp, regexp};
use crate::pagerduty::{
    IncidentQuery, PagerDutyApi, STATUS_ACK, STATUS_RESOLVED, STATUS_TRIGGERED, URGENCY_HIGH,
    URGENCY_LOW,
};
use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::transform::{
    self, color_when, escaped, extract, extract_alerts, extract_assignees, extract_date, extract_decorate,
    extract_from_dict, ChangeMap, Extractor, Mode, TransformError, Transformations,
};

/// Columns shown when `--fields` is not given.
pub const DEFAULT_FIELDS: [&str; 7] = [
    "id",
    "assignee",
    "title",
    "status",
    "created_at",
    "last_status_change_at",
    "url",
];

/// Alert subfields shown when `--alert-fields` is not given.
pub const DEFAULT_ALERT_FIELDS: [&str; 6] = [
    "status",
    "created_at",
    "service.summary",
    "body.details.Condition",
    "body.details.Segment",
    "body.details.Scope",
];

/// Default snooze duration: four hours.
pub const DEFAULT_SNOOZE_SECS: u64 = 14_400;

/// Selection criteria of `inc ls`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Ignore assignment and list every open incident.
    pub everything: bool,
    /// Only incidents assigned to users matching this name or email.
    pub user: Option<String>,
    /// Only triggered incidents.
    pub new_only: bool,
    /// Only high urgency.
    pub high_only: bool,
    /// Only low urgency.
    pub low_only: bool,
    /// Regular expression the title must match; empty matches everything.
    pub title_regexp: String,
    /// Regular expression the service name must match.
    pub service_regexp: Option<String>,
    /// Regular expression the service name must not match.
    pub excluded_service_regexp: Option<String>,
    /// Attach each incident's alerts under `alerts`.
    pub alerts: bool,
}

impl ListOptions {
    /// Server-side query for these options and the resolved `user_ids`.
    pub fn query(&self, user_ids: Vec<String>) -> IncidentQuery {
        let mut statuses = vec![STATUS_TRIGGERED.to_owned()];
        if !self.new_only {
            statuses.push(STATUS_ACK.to_owned());
        }
        let urgencies = if self.low_only {
            vec![URGENCY_LOW.to_owned()]
        } else if self.high_only {
            vec![URGENCY_HIGH.to_owned()]
        } else {
            vec![URGENCY_HIGH.to_owned(), URGENCY_LOW.to_owned()]
        };
        IncidentQuery {
            user_ids,
            statuses,
            urgencies,
        }
    }

    /// Client-side filters: title first, then the derived service name.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Filter`] for an invalid regular expression.
    pub fn pipeline(&self) -> Result<Pipeline, CommandError> {
        let mut pipeline = Pipeline::new().filter(vec![regexp("title", &self.title_regexp)?]);

        let mut service_filters = Vec::new();
        if let Some(pattern) = &self.service_regexp {
            service_filters.push(regexp("service", pattern)?);
        }
        if let Some(pattern) = &self.excluded_service_regexp {
            service_filters.push(not_regexp("service", pattern)?);
        }
        if !service_filters.is_empty() {
            pipeline = pipeline
                .derive(Transformations::new().with("service", extract_from_dict("service", "summary", "")))
                .filter(service_filters);
        }
        Ok(pipeline)
    }
}

/// Fetch and filter incidents for `inc ls`.
///
/// Without `--user` or `--everything` only incidents assigned to `uid` are
/// listed. Records come back as the API returned them, except for the
/// derived `service` name when a service filter is active and the `alerts`
/// list when requested.
///
/// # Errors
///
/// Returns [`CommandError`] on API, user lookup, or filter failure.
pub async fn list_incidents(
    api: &dyn PagerDutyApi,
    opts: &ListOptions,
    uid: &str,
) -> Result<Vec<Record>, CommandError> {
    let user_ids = match &opts.user {
        Some(user) => resolve_user_ids(api, user).await?,
        None if opts.everything => Vec::new(),
        None => vec![uid.to_owned()],
    };

    let pipeline = opts.pipeline()?;
    let fetched = api.list_incidents(&opts.query(user_ids)).await?;
    let fetched_count = fetched.len();
    let mut incidents = pipeline.run(fetched)?;
    debug!(fetched = fetched_count, kept = incidents.len(), "incidents filtered");

    if opts.alerts {
        for incident in &mut incidents {
            let id = incident_id(incident)?;
            let alerts = api.incident_alerts(&id).await?;
            incident.insert(
                "alerts".to_owned(),
                Value::Array(alerts.into_iter().map(Value::Object).collect()),
            );
        }
    }
    Ok(incidents)
}

fn incident_id(incident: &Record) -> Result<String, CommandError> {
    let id = crate::record::get_path(incident, "id").map_err(TransformError::from)?;
    match id.as_str() {
        Some(id) if !id.is_empty() => Ok(id.to_owned()),
        _ => Err(TransformError::Shape {
            path: "id".to_owned(),
            expected: "a non-empty string",
        }
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Column list from a `--fields` value, plus `alerts` when requested.
pub fn display_fields(raw: Option<&str>, alerts: bool) -> Vec<String> {
    let mut fields = match raw {
        Some(raw) => super::parse_field_list(raw),
        None => DEFAULT_FIELDS.iter().map(|f| (*f).to_owned()).collect(),
    };
    if alerts && !fields.iter().any(|f| f == "alerts") {
        fields.push("alerts".to_owned());
    }
    fields
}

/// Alert subfields from an `--alert-fields` value.
pub fn alert_fields(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) => super::parse_field_list(raw),
        None => DEFAULT_ALERT_FIELDS.iter().map(|f| (*f).to_owned()).collect(),
    }
}

fn incident_extractor(field: &str, alert_fields: &[String]) -> Extractor {
    match field {
        "assignee" => extract_assignees("magenta"),
        "status" => {
            let mut labels = ChangeMap::new();
            labels.insert(STATUS_ACK.to_owned(), "✔".to_owned());
            labels.insert(STATUS_TRIGGERED.to_owned(), "✘".to_owned());
            extract_decorate("status")
                .change_map(labels)
                .map_func(color_when("status", STATUS_TRIGGERED, "red", "yellow"))
                .build()
        }
        "url" => escaped(extract("html_url")),
        "title" | "urgency" => extract_decorate(field)
            .map_func(color_when("urgency", URGENCY_HIGH, "red", "cyan"))
            .build(),
        "created_at" | "last_status_change_at" => extract_date(field),
        "alerts" => {
            let subfields: Vec<&str> = alert_fields.iter().map(String::as_str).collect();
            extract_alerts("alerts", &subfields)
        }
        other => escaped(extract(other)),
    }
}

/// Presentation projection for the given columns.
pub fn incident_transformations(fields: &[String], alert_fields: &[String]) -> Transformations {
    fields
        .iter()
        .map(|f| (f.clone(), incident_extractor(f, alert_fields)))
        .collect()
}

/// Project incidents onto display columns.
///
/// # Errors
///
/// Returns [`TransformError`] when an incident lacks a requested field.
pub fn project_incidents(
    incidents: Vec<Record>,
    fields: &[String],
    alert_fields: &[String],
) -> Result<Vec<Record>, TransformError> {
    transform::apply(incidents, &incident_transformations(fields, alert_fields), Mode::Fresh)
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Move `incidents` to `status`.
///
/// # Errors
///
/// Returns [`CommandError::Api`] on failure.
pub async fn set_status(api: &dyn PagerDutyApi, incidents: &[Record], status: &str) -> Result<(), CommandError> {
    api.update_status(incidents, status).await?;
    info!(count = incidents.len(), status, "status updated");
    Ok(())
}

/// Snooze every incident for `duration_secs`.
///
/// # Errors
///
/// Returns the first [`CommandError::Api`] failure.
pub async fn snooze_all(api: &dyn PagerDutyApi, incidents: &[Record], duration_secs: u64) -> Result<(), CommandError> {
    for id in super::record_ids(incidents) {
        api.snooze(&id, duration_secs).await?;
        info!(incident = %id, duration_secs, "incident snoozed");
    }
    Ok(())
}

async fn open_incidents(api: &dyn PagerDutyApi, ids: &[String]) -> Result<Vec<Record>, CommandError> {
    let open = api.list_incidents(&IncidentQuery::open()).await?;
    Ok(select_by_ids(open, ids)?)
}

/// Acknowledge the open incidents among `ids`; returns those acted on.
///
/// # Errors
///
/// Returns [`CommandError`] on API or filter failure.
pub async fn ack_incidents(api: &dyn PagerDutyApi, ids: &[String]) -> Result<Vec<Record>, CommandError> {
    let incidents = open_incidents(api, ids).await?;
    set_status(api, &incidents, STATUS_ACK).await?;
    Ok(incidents)
}

/// Resolve the open incidents among `ids`; returns those acted on.
///
/// # Errors
///
/// Returns [`CommandError`] on API or filter failure.
pub async fn resolve_incidents(api: &dyn PagerDutyApi, ids: &[String]) -> Result<Vec<Record>, CommandError> {
    let incidents = open_incidents(api, ids).await?;
    set_status(api, &incidents, STATUS_RESOLVED).await?;
    Ok(incidents)
}

/// Snooze the open incidents among `ids`; returns those acted on.
///
/// # Errors
///
/// Returns [`CommandError`] on API or filter failure.
pub async fn snooze_incidents(
    api: &dyn PagerDutyApi,
    ids: &[String],
    duration_secs: u64,
) -> Result<Vec<Record>, CommandError> {
    let incidents = open_incidents(api, ids).await?;
    snooze_all(api, &incidents, duration_secs).await?;
    Ok(incidents)
}

/// Assign the open incidents among `ids` to the users matching `user`.
///
/// Returns the incidents acted on and the new assignee ids.
///
/// # Errors
///
/// Returns [`CommandError::UserNotFound`] when no user matches, or the
/// underlying API or filter failure.
pub async fn reassign_incidents(
    api: &dyn PagerDutyApi,
    ids: &[String],
    user: &str,
) -> Result<(Vec<Record>, Vec<String>), CommandError> {
    let user_ids = resolve_user_ids(api, user).await?;
    let incidents = open_incidents(api, ids).await?;
    for id in super::record_ids(&incidents) {
        api.reassign(&id, &user_ids).await?;
        info!(incident = %id, assignees = ?user_ids, "incident reassigned");
    }
    Ok((incidents, user_ids))
}
