//! Records and dotted-path access.
//!
//! A [`Record`] is one incident, user or service as returned by the API: an
//! insertion-ordered JSON object with no fixed schema. Fields are addressed
//! by dotted paths such as `service.summary` or `body.details.Condition`.
//!
//! Paths walk through nested objects only. Consumers that need to traverse
//! lists (assignments, alerts) do so explicitly in their own extractor.

use serde_json::{Map, Value};

/// One nested key/value item flowing through the pipeline.
pub type Record = Map<String, Value>;

/// Errors produced while resolving or assigning a dotted path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// A segment of the path is absent from the record.
    #[error("field '{path}' not found")]
    Missing {
        /// Full path that was requested.
        path: String,
    },
    /// A segment resolved to something other than an object.
    #[error("field '{path}': segment '{segment}' is not an object")]
    NotAnObject {
        /// Full path that was requested.
        path: String,
        /// The segment holding the non-object value.
        segment: String,
    },
    /// The path is empty or contains an empty segment.
    #[error("invalid field path '{path}'")]
    Empty {
        /// Path as given by the caller.
        path: String,
    },
}

fn segments(path: &str) -> Result<Vec<&str>, PathError> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|s| s.is_empty()) {
        return Err(PathError::Empty {
            path: path.to_owned(),
        });
    }
    Ok(parts)
}

/// Resolve `path` inside `record`.
///
/// # Errors
///
/// Returns [`PathError::Missing`] when any segment is absent and
/// [`PathError::NotAnObject`] when an intermediate value is not an object.
pub fn get_path<'a>(record: &'a Record, path: &str) -> Result<&'a Value, PathError> {
    let parts = segments(path)?;
    let mut current = record;
    let last = parts.len().saturating_sub(1);

    for (idx, segment) in parts.iter().enumerate() {
        let value = current.get(*segment).ok_or_else(|| PathError::Missing {
            path: path.to_owned(),
        })?;
        if idx == last {
            return Ok(value);
        }
        current = value.as_object().ok_or_else(|| PathError::NotAnObject {
            path: path.to_owned(),
            segment: (*segment).to_owned(),
        })?;
    }

    Err(PathError::Empty {
        path: path.to_owned(),
    })
}

/// Resolve `path`, returning `default` when a segment is absent.
///
/// Type mismatches along the path are still reported.
///
/// # Errors
///
/// Returns [`PathError::NotAnObject`] or [`PathError::Empty`].
pub fn get_path_or(record: &Record, path: &str, default: &Value) -> Result<Value, PathError> {
    match get_path(record, path) {
        Ok(value) => Ok(value.clone()),
        Err(PathError::Missing { .. }) => Ok(default.clone()),
        Err(e) => Err(e),
    }
}

/// Assign `value` at `path`, creating intermediate objects as needed.
///
/// # Errors
///
/// Returns [`PathError::NotAnObject`] when an existing intermediate value is
/// not an object.
pub fn set_path(record: &mut Record, path: &str, value: Value) -> Result<(), PathError> {
    let parts = segments(path)?;
    let Some((leaf, parents)) = parts.split_last() else {
        return Err(PathError::Empty {
            path: path.to_owned(),
        });
    };

    let mut current = record;
    for segment in parents {
        let entry = current
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        current = entry
            .as_object_mut()
            .ok_or_else(|| PathError::NotAnObject {
                path: path.to_owned(),
                segment: (*segment).to_owned(),
            })?;
    }
    current.insert((*leaf).to_owned(), value);
    Ok(())
}

/// Render a value the way a human expects to read it in a cell.
///
/// Strings are returned verbatim, `null` becomes empty, everything else is
/// compact JSON.
pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
