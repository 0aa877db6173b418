//! Named extractor factories.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, Utc};
use serde_json::Value;

use super::{Extractor, TransformError};
use crate::markup::{escape, wrap};
use crate::record::{get_path, get_path_or, value_to_display, Record};

/// Timestamp layout used by the PagerDuty API.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Raw display value to replacement label.
pub type ChangeMap = HashMap<String, String>;

type MapFn = Arc<dyn Fn(String, &Record) -> String + Send + Sync>;

fn resolve(record: &Record, path: &str, default: Option<&Value>) -> Result<Value, TransformError> {
    match default {
        Some(default) => Ok(get_path_or(record, path, default)?),
        None => Ok(get_path(record, path)?.clone()),
    }
}

/// Copy the value at `path`; a missing path is an error.
pub fn extract(path: &str) -> Extractor {
    let path = path.to_owned();
    Extractor::new(move |r| resolve(r, &path, None))
}

/// Copy the value at `path`, or `default` when it is absent.
pub fn extract_or(path: &str, default: impl Into<Value>) -> Extractor {
    let path = path.to_owned();
    let default = default.into();
    Extractor::new(move |r| resolve(r, &path, Some(&default)))
}

/// Markup-safe form of `inner` for display projections: string results are
/// escaped, other values pass through.
pub fn escaped(inner: Extractor) -> Extractor {
    Extractor::new(move |r| {
        Ok(match inner.run(r)? {
            Value::String(s) => Value::String(escape(&s)),
            other => other,
        })
    })
}

fn relabel(raw: Value, change_map: &ChangeMap) -> Value {
    match change_map.get(&value_to_display(&raw)) {
        Some(label) => Value::String(label.clone()),
        None => raw,
    }
}

/// Copy the value at `path`, replacing it when it is a key of `change_map`.
pub fn extract_change(path: &str, change_map: ChangeMap) -> Extractor {
    let path = path.to_owned();
    Extractor::new(move |r| Ok(relabel(resolve(r, &path, None)?, &change_map)))
}

/// [`extract_change`] with a default for absent paths.
pub fn extract_change_or(path: &str, change_map: ChangeMap, default: impl Into<Value>) -> Extractor {
    let path = path.to_owned();
    let default = default.into();
    Extractor::new(move |r| Ok(relabel(resolve(r, &path, Some(&default))?, &change_map)))
}

// ---------------------------------------------------------------------------
// Decorated extraction
// ---------------------------------------------------------------------------

/// Builder for a decorated, markup-producing extractor.
///
/// Steps run in a fixed order: escape, relabel via the change map, color
/// keyed by the original value, custom map, default style.
#[derive(Clone)]
pub struct Decorate {
    path: String,
    default: Option<Value>,
    color_map: HashMap<String, String>,
    default_color: Option<String>,
    change_map: ChangeMap,
    map_func: Option<MapFn>,
}

/// Start a decorated extractor for `path`.
pub fn extract_decorate(path: &str) -> Decorate {
    Decorate {
        path: path.to_owned(),
        default: None,
        color_map: HashMap::new(),
        default_color: None,
        change_map: ChangeMap::new(),
        map_func: None,
    }
}

impl Decorate {
    /// Value used when the path is absent.
    #[must_use]
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Style keyed by the original (pre-relabel) value.
    #[must_use]
    pub fn color_map(mut self, color_map: HashMap<String, String>) -> Self {
        self.color_map = color_map;
        self
    }

    /// Outermost style applied to every value.
    #[must_use]
    pub fn default_color(mut self, style: &str) -> Self {
        self.default_color = Some(style.to_owned());
        self
    }

    /// Relabel table applied before coloring.
    #[must_use]
    pub fn change_map(mut self, change_map: ChangeMap) -> Self {
        self.change_map = change_map;
        self
    }

    /// Custom step receiving the decorated text and the whole record.
    #[must_use]
    pub fn map_func(mut self, func: impl Fn(String, &Record) -> String + Send + Sync + 'static) -> Self {
        self.map_func = Some(Arc::new(func));
        self
    }

    /// Finish the builder.
    pub fn build(self) -> Extractor {
        Extractor::new(move |r| self.decorate(r).map(Value::String))
    }

    fn decorate(&self, record: &Record) -> Result<String, TransformError> {
        let raw = resolve(record, &self.path, self.default.as_ref())?;
        let original = value_to_display(&raw);

        let mut text = match self.change_map.get(&original) {
            Some(label) => escape(label),
            None => escape(&original),
        };
        if let Some(style) = self.color_map.get(&original) {
            text = wrap(style, &text);
        }
        if let Some(func) = &self.map_func {
            text = func(text, record);
        }
        if let Some(style) = &self.default_color {
            text = wrap(style, &text);
        }
        Ok(text)
    }
}

/// Custom decoration step: `hit` style when `field` equals `expected`,
/// `miss` style otherwise.
pub fn color_when(
    field: &str,
    expected: &str,
    hit: &str,
    miss: &str,
) -> impl Fn(String, &Record) -> String + Send + Sync + 'static {
    let field = field.to_owned();
    let expected = expected.to_owned();
    let hit = hit.to_owned();
    let miss = miss.to_owned();
    move |text, record| {
        let matched = get_path(record, &field)
            .ok()
            .and_then(Value::as_str)
            .is_some_and(|v| v == expected);
        wrap(if matched { &hit } else { &miss }, &text)
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

fn divmod(n: i64, d: i64) -> (i64, i64) {
    (n.checked_div(d).unwrap_or(0), n.checked_rem(d).unwrap_or(0))
}

/// Render an elapsed duration as `"{d}d {h}h {m}m ago"`, omitting zero units.
///
/// Anything under a minute, and negative durations, render as
/// `"less than 1m ago"`.
pub fn humanize_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (days, rest) = divmod(total, 86_400);
    let (hours, rest) = divmod(rest, 3_600);
    let (minutes, _) = divmod(rest, 60);

    let parts: Vec<String> = [(days, "d"), (hours, "h"), (minutes, "m")]
        .into_iter()
        .filter(|(v, _)| *v > 0)
        .map(|(v, unit)| format!("{v}{unit}"))
        .collect();

    if parts.is_empty() {
        "less than 1m ago".to_owned()
    } else {
        format!("{} ago", parts.join(" "))
    }
}

fn parse_timestamp(raw: &str, format: &str, offset: FixedOffset) -> Result<DateTime<Utc>, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(raw, format) {
        Ok(naive) => {
            let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
            let utc = naive.and_utc();
            Ok(utc.checked_sub_signed(shift).unwrap_or(utc))
        }
        Err(err) => DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| err),
    }
}

/// Relative age of a UTC timestamp in [`DEFAULT_DATE_FORMAT`].
pub fn extract_date(path: &str) -> Extractor {
    extract_date_with(path, DEFAULT_DATE_FORMAT, FixedOffset::east_opt(0))
}

/// Relative age of a timestamp parsed with `format`.
///
/// Timestamps without their own offset are read in `offset` (UTC when
/// `None`). RFC 3339 values are accepted as a fallback.
pub fn extract_date_with(path: &str, format: &str, offset: Option<FixedOffset>) -> Extractor {
    let path = path.to_owned();
    let format = format.to_owned();
    let offset = offset.unwrap_or(Utc.fix());
    Extractor::new(move |r| {
        let raw = value_to_display(get_path(r, &path)?);
        let ts = parse_timestamp(&raw, &format, offset).map_err(|source| TransformError::Date {
            path: path.clone(),
            value: raw.clone(),
            source,
        })?;
        Ok(Value::String(humanize_elapsed(Utc::now().signed_duration_since(ts))))
    })
}

// ---------------------------------------------------------------------------
// List-shaped fields
// ---------------------------------------------------------------------------

fn array_at<'a>(record: &'a Record, path: &str) -> Result<&'a Vec<Value>, TransformError> {
    get_path(record, path)?
        .as_array()
        .ok_or_else(|| TransformError::Shape {
            path: path.to_owned(),
            expected: "a list",
        })
}

fn object_item<'a>(item: &'a Value, path: &str) -> Result<&'a Record, TransformError> {
    item.as_object().ok_or_else(|| TransformError::Shape {
        path: path.to_owned(),
        expected: "a list of objects",
    })
}

fn join_subfield(record: &Record, list: &str, subfield: &str, sep: &str) -> Result<String, TransformError> {
    let names = array_at(record, list)?
        .iter()
        .map(|item| -> Result<String, TransformError> {
            Ok(value_to_display(get_path(object_item(item, list)?, subfield)?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.join(sep))
}

/// Names of every assignee, joined with `", "` and wrapped in `color`.
pub fn extract_assignees(color: &str) -> Extractor {
    let color = color.to_owned();
    Extractor::new(move |r| {
        let names = join_subfield(r, "assignments", "assignee.summary", ", ")?;
        Ok(Value::String(wrap(&color, &escape(&names))))
    })
}

/// Team names of a user, joined with `","`.
pub fn extract_teams() -> Extractor {
    Extractor::new(|r| Ok(Value::String(join_subfield(r, "teams", "summary", ",")?)))
}

/// Pending actions as `"{type} at {at}"`, joined with `", "`.
pub fn extract_pending_actions() -> Extractor {
    Extractor::new(|r| {
        let actions = array_at(r, "pending_actions")?
            .iter()
            .map(|item| -> Result<String, TransformError> {
                let action = object_item(item, "pending_actions")?;
                Ok(format!(
                    "{} at {}",
                    value_to_display(get_path(action, "type")?),
                    value_to_display(get_path(action, "at")?)
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::String(actions.join(", ")))
    })
}

/// Summary of the alert list at `path`, keyed by alert id.
///
/// Each alert is reduced to `subfields` (dotted paths allowed); subfields an
/// alert lacks are left out. The result is pretty-printed JSON.
pub fn extract_alerts(path: &str, subfields: &[&str]) -> Extractor {
    let path = path.to_owned();
    let subfields: Vec<String> = subfields.iter().map(|s| (*s).to_owned()).collect();
    Extractor::new(move |r| {
        let mut summary = Record::new();
        for item in array_at(r, &path)? {
            let alert = object_item(item, &path)?;
            let id = value_to_display(get_path(alert, "id")?);
            let mut projected = Record::new();
            for field in &subfields {
                if let Ok(value) = get_path(alert, field) {
                    projected.insert(field.clone(), value.clone());
                }
            }
            summary.insert(id, Value::Object(projected));
        }
        let rendered = serde_json::to_string_pretty(&summary).map_err(|source| TransformError::Json {
            path: path.clone(),
            source,
        })?;
        Ok(Value::String(escape(&rendered)))
    })
}

/// `field.subfield` as a string.
///
/// Yields `missing` when `field` is absent and `""` when it is not an
/// object or the subfield is absent or null.
pub fn extract_from_dict(field: &str, subfield: &str, missing: &str) -> Extractor {
    let field = field.to_owned();
    let subfield = subfield.to_owned();
    let missing = missing.to_owned();
    Extractor::new(move |r| {
        let Some(outer) = r.get(&field) else {
            return Ok(Value::String(missing.clone()));
        };
        let text = outer
            .as_object()
            .and_then(|o| o.get(&subfield))
            .map(value_to_display)
            .unwrap_or_default();
        Ok(Value::String(text))
    })
}
