//! User listing and lookup.

use super::CommandError;
use crate::pagerduty::{self, PagerDutyApi};
use crate::record::Record;
use crate::transform::{self, escaped, extract, extract_teams, Extractor, Mode, Transformations};

/// Columns of `user ls` when `--fields` is not given.
pub const DEFAULT_LIST_FIELDS: [&str; 7] = ["id", "name", "email", "time_zone", "role", "job_title", "teams"];

/// Columns of `user get` when `--fields` is not given; `teams` is always added.
pub const DEFAULT_GET_FIELDS: [&str; 6] = ["id", "name", "email", "time_zone", "role", "job_title"];

fn user_extractor(field: &str) -> Extractor {
    if field == "teams" {
        escaped(extract_teams())
    } else {
        escaped(extract(field))
    }
}

/// Presentation projection for user columns; `teams` becomes a joined name list.
pub fn user_transformations(fields: &[String]) -> Transformations {
    fields.iter().map(|f| (f.clone(), user_extractor(f))).collect()
}

fn default_fields(defaults: &[&str]) -> Vec<String> {
    defaults.iter().map(|f| (*f).to_owned()).collect()
}

/// Every user, projected onto `fields` unless `raw`.
///
/// # Errors
///
/// Returns [`CommandError`] on API failure or when a user lacks a field.
pub async fn list_users(
    api: &dyn PagerDutyApi,
    fields: Option<&[String]>,
    raw: bool,
) -> Result<Vec<Record>, CommandError> {
    let users = api.list_users().await?;
    if raw {
        return Ok(users);
    }
    let fields = fields.map_or_else(|| default_fields(&DEFAULT_LIST_FIELDS), <[String]>::to_vec);
    Ok(transform::apply(users, &user_transformations(&fields), Mode::Fresh)?)
}

/// Users whose name contains `query`, or failing that whose id does.
///
/// # Errors
///
/// Returns [`CommandError`] on API failure or when a user lacks a field.
pub async fn get_user(
    api: &dyn PagerDutyApi,
    query: &str,
    fields: Option<&[String]>,
    raw: bool,
) -> Result<Vec<Record>, CommandError> {
    let users = api.list_users().await?;
    let mut found = pagerduty::search_users(users.clone(), query, "name")?;
    if found.is_empty() {
        found = pagerduty::search_users(users, query, "id")?;
    }
    if raw {
        return Ok(found);
    }

    let fields = fields.map_or_else(|| default_fields(&DEFAULT_GET_FIELDS), <[String]>::to_vec);
    let transformations = user_transformations(&fields).with("teams", user_extractor("teams"));
    Ok(transform::apply(found, &transformations, Mode::Fresh)?)
}
