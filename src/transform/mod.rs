//! Field extraction and record projection.
//!
//! An [`Extractor`] computes one output value from a whole input record.
//! [`Transformations`] is an ordered list of `(output path, extractor)` pairs
//! and [`apply`] runs it over a record set, either building fresh projected
//! records or augmenting the input records in place ([`Mode::Preserve`]).
//!
//! The order of [`Transformations`] fixes the key order of projected records,
//! which in turn fixes table column order.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::record::{set_path, PathError, Record};

pub mod extractors;

pub use extractors::{
    color_when, escaped, extract, extract_alerts, extract_assignees, extract_change,
    extract_change_or, extract_date, extract_date_with, extract_decorate, extract_from_dict,
    extract_or, extract_pending_actions, extract_teams, humanize_elapsed, ChangeMap, Decorate,
    DEFAULT_DATE_FORMAT,
};

/// Errors raised while extracting a field.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// A required path is missing or crosses a non-object.
    #[error(transparent)]
    Path(#[from] PathError),
    /// A timestamp did not match the expected format.
    #[error("field '{path}': cannot parse date '{value}': {source}")]
    Date {
        /// Field path.
        path: String,
        /// Raw value found.
        value: String,
        /// Parser error.
        #[source]
        source: chrono::ParseError,
    },
    /// A value did not have the shape a special-cased extractor needs.
    #[error("field '{path}': expected {expected}")]
    Shape {
        /// Field path.
        path: String,
        /// Human description of the expected shape.
        expected: &'static str,
    },
    /// Serializing an aggregate value failed.
    #[error("failed to serialize field '{path}': {source}")]
    Json {
        /// Field path.
        path: String,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
}

type ExtractFn = dyn Fn(&Record) -> Result<Value, TransformError> + Send + Sync;

/// Computes one output field from an input record.
#[derive(Clone)]
pub struct Extractor(Arc<ExtractFn>);

impl Extractor {
    /// Wrap an extraction function.
    pub fn new(func: impl Fn(&Record) -> Result<Value, TransformError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(func))
    }

    /// Run the extractor against `record`.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`TransformError`] the extraction raises.
    pub fn run(&self, record: &Record) -> Result<Value, TransformError> {
        (self.0)(record)
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Extractor(..)")
    }
}

/// Ordered mapping of output path to extractor.
#[derive(Debug, Clone, Default)]
pub struct Transformations {
    fields: Vec<(String, Extractor)>,
}

impl Transformations {
    /// Empty transformation set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Transformations::insert`].
    #[must_use]
    pub fn with(mut self, path: &str, extractor: Extractor) -> Self {
        self.insert(path, extractor);
        self
    }

    /// Add or replace the extractor for `path`.
    ///
    /// Replacing keeps the original position.
    pub fn insert(&mut self, path: &str, extractor: Extractor) {
        match self.fields.iter_mut().find(|(p, _)| p == path) {
            Some(slot) => slot.1 = extractor,
            None => self.fields.push((path.to_owned(), extractor)),
        }
    }

    /// Iterate `(path, extractor)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Extractor)> {
        self.fields.iter().map(|(p, e)| (p.as_str(), e))
    }

    /// Number of output fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no output field is defined.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Extractor)> for Transformations {
    fn from_iter<I: IntoIterator<Item = (String, Extractor)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (path, extractor) in iter {
            out.insert(&path, extractor);
        }
        out
    }
}

/// How [`apply`] builds each output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Start from an empty record: a pure projection.
    #[default]
    Fresh,
    /// Start from the input record and add the extracted fields to it.
    Preserve,
}

/// Build one output record per input record.
///
/// Extractors always read the untouched input record, never the output
/// being built. Output order matches input order.
///
/// # Errors
///
/// Returns the first [`TransformError`] raised by an extractor or by
/// assigning its output path.
pub fn apply(
    records: Vec<Record>,
    transformations: &Transformations,
    mode: Mode,
) -> Result<Vec<Record>, TransformError> {
    records
        .into_iter()
        .map(|record| {
            let mut out = match mode {
                Mode::Fresh => Record::new(),
                Mode::Preserve => record.clone(),
            };
            for (path, extractor) in transformations.iter() {
                let value = extractor.run(&record)?;
                set_path(&mut out, path, value)?;
            }
            Ok(out)
        })
        .collect()
}
