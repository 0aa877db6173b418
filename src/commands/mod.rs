//! CLI use-cases composed from the record pipeline and the API client.
//!
//! Commands return records and never print; the binary decides how results
//! are rendered.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::filters::{self, FilterError};
use crate::pagerduty::{self, ApiError, PagerDutyApi};
use crate::pipeline::PipelineError;
use crate::record::Record;
use crate::rules::{self, RuleError, RuleReport, RuleRunner};
use crate::transform::TransformError;

pub mod incidents;
pub mod users;

pub use incidents::{
    ack_incidents, incident_transformations, list_incidents, project_incidents, reassign_incidents,
    resolve_incidents, set_status, snooze_all, snooze_incidents, ListOptions,
};
pub use users::{get_user, list_users, user_transformations};

/// Errors produced by a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// A filter could not be built or evaluated.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// A projection failed.
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// A filter/transform pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// A rule failed.
    #[error(transparent)]
    Rule(#[from] RuleError),
    /// No user matched the query.
    #[error("no user matches '{0}'")]
    UserNotFound(String),
}

impl CommandError {
    /// Whether the API rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized { .. }))
    }
}

/// Split a comma separated `--fields` value into trimmed, lowercase names.
pub fn parse_field_list(raw: &str) -> Vec<String> {
    raw.trim()
        .to_lowercase()
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Records whose `id` is one of `ids`.
///
/// # Errors
///
/// Returns [`FilterError`] when a record has no `id`.
pub fn select_by_ids(records: Vec<Record>, ids: &[String]) -> Result<Vec<Record>, FilterError> {
    filters::apply(records, &[filters::in_list("id", ids.iter().cloned())])
}

/// The `id` of every record.
pub fn record_ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_owned))
        .collect()
}

/// User ids matching `query` by name, then by email.
///
/// # Errors
///
/// Returns [`CommandError::UserNotFound`] when nothing matches, or the
/// underlying API or filter failure.
pub async fn resolve_user_ids(api: &dyn PagerDutyApi, query: &str) -> Result<Vec<String>, CommandError> {
    let users = api.list_users().await?;
    let mut found = pagerduty::search_users(users.clone(), query, "name")?;
    if found.is_empty() {
        found = pagerduty::search_users(users, query, "email")?;
    }
    if found.is_empty() {
        return Err(CommandError::UserNotFound(query.to_owned()));
    }
    let ids = pagerduty::user_ids(&found);
    info!(query, matched = ids.len(), "resolved users");
    Ok(ids)
}

/// Rules to run: `explicit` scripts when given, otherwise every executable
/// under `dir`.
///
/// # Errors
///
/// Returns [`RuleError::Discover`] when `dir` cannot be walked.
pub fn resolve_rules(dir: Option<&Path>, explicit: &[PathBuf]) -> Result<Vec<PathBuf>, RuleError> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    match dir {
        Some(dir) => rules::discover(dir),
        None => Ok(Vec::new()),
    }
}

/// Pipe `records` through `scripts` as one chain and normalize the result.
///
/// # Errors
///
/// Returns the first failing stage as [`CommandError::Rule`].
pub async fn run_rules_chained(
    runner: &RuleRunner,
    records: &[Record],
    scripts: &[PathBuf],
) -> Result<Vec<Record>, CommandError> {
    let output = runner.apply(records, scripts).await?;
    Ok(rules::into_records(output))
}

/// Run each script on `records` independently.
pub async fn run_rules_each(runner: &RuleRunner, records: &[Record], scripts: &[PathBuf]) -> Vec<RuleReport> {
    let input = Value::Array(records.iter().cloned().map(Value::Object).collect());
    runner.apply_each(&input, scripts).await
}
