//! Predicate filters over record sets.
//!
//! Each factory closes over a field path and a comparison value and returns
//! a [`Predicate`]. Fields are resolved with the dotted-path accessor; a
//! missing field is an error, never a silent `false`, so a typo in a filter
//! surfaces instead of emptying the result.
//!
//! [`apply`] runs predicates in list order, each one narrowing the set left
//! by the previous one.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::record::{get_path, value_to_display, PathError, Record};

/// Errors raised while building or evaluating a predicate.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The field could not be resolved.
    #[error(transparent)]
    Path(#[from] PathError),
    /// A string operation was applied to a non-string value.
    #[error("field '{field}' is not a string (found {found})")]
    NotAString {
        /// Field path.
        field: String,
        /// JSON type of the value found.
        found: &'static str,
    },
    /// The field value cannot be ordered against the operand.
    #[error("field '{field}' value {value} is not comparable with {operand}")]
    NotComparable {
        /// Field path.
        field: String,
        /// Value found in the record.
        value: String,
        /// Operand the predicate was built with.
        operand: String,
    },
    /// The regular expression does not compile.
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        /// Pattern as given by the caller.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },
}

/// Ordering comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl CmpOp {
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

type CustomFn = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

#[derive(Clone)]
enum Kind {
    Eq(Value),
    Ieq(String),
    Cmp(CmpOp, Value),
    InList(Vec<Value>),
    InStr(String),
    Regexp { regex: Regex, negate: bool },
    Custom(CustomFn),
}

/// A pure boolean test over a [`Record`].
#[derive(Clone)]
pub struct Predicate {
    field: String,
    kind: Kind,
}

impl Predicate {
    /// Field path (or name, for custom predicates) this predicate reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Evaluate the predicate against one record.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when the field is missing or its value has the
    /// wrong type for this predicate.
    pub fn test(&self, record: &Record) -> Result<bool, FilterError> {
        match &self.kind {
            Kind::Custom(func) => Ok(func(record)),
            Kind::Eq(expected) => Ok(values_equal(self.value(record)?, expected)),
            Kind::Ieq(expected) => {
                let text = self.as_str(self.value(record)?)?;
                Ok(text.to_lowercase() == expected.to_lowercase())
            }
            Kind::Cmp(op, operand) => {
                let value = self.value(record)?;
                let ord = compare_values(value, operand).ok_or_else(|| {
                    FilterError::NotComparable {
                        field: self.field.clone(),
                        value: value.to_string(),
                        operand: operand.to_string(),
                    }
                })?;
                Ok(op.accepts(ord))
            }
            Kind::InList(allowed) => {
                let value = self.value(record)?;
                Ok(allowed.iter().any(|v| values_equal(value, v)))
            }
            Kind::InStr(needle) => Ok(self
                .as_str(self.value(record)?)?
                .to_lowercase()
                .contains(&needle.to_lowercase())),
            Kind::Regexp { regex, negate } => {
                let found = regex.is_match(self.as_str(self.value(record)?)?);
                Ok(found != *negate)
            }
        }
    }

    fn value<'a>(&self, record: &'a Record) -> Result<&'a Value, FilterError> {
        Ok(get_path(record, &self.field)?)
    }

    fn as_str<'a>(&self, value: &'a Value) -> Result<&'a str, FilterError> {
        value.as_str().ok_or_else(|| FilterError::NotAString {
            field: self.field.clone(),
            found: json_type(value),
        })
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({self})")
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.kind {
            Kind::Eq(v) => write!(f, "{field} == {v}"),
            Kind::Ieq(v) => write!(f, "{field} ~= {v:?}"),
            Kind::Cmp(op, v) => write!(f, "{field} {} {v}", op.symbol()),
            Kind::InList(vs) => {
                let items: Vec<String> = vs.iter().map(value_to_display).collect();
                write!(f, "{field} in [{}]", items.join(", "))
            }
            Kind::InStr(v) => write!(f, "{v:?} in {field}"),
            Kind::Regexp { regex, negate } => {
                let op = if *negate { "!~" } else { "=~" };
                write!(f, "{field} {op} /{}/", regex.as_str())
            }
            Kind::Custom(_) => write!(f, "custom({field})"),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Order two JSON values: numbers numerically, strings lexicographically.
///
/// Returns `None` for any other pairing.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

fn predicate(field: &str, kind: Kind) -> Predicate {
    Predicate {
        field: field.to_owned(),
        kind,
    }
}

/// Field value equals `value`.
pub fn eq(field: &str, value: impl Into<Value>) -> Predicate {
    predicate(field, Kind::Eq(value.into()))
}

/// Field string equals `value`, ignoring case.
pub fn ieq(field: &str, value: &str) -> Predicate {
    predicate(field, Kind::Ieq(value.to_owned()))
}

/// Field value is strictly less than `value`.
pub fn lt(field: &str, value: impl Into<Value>) -> Predicate {
    predicate(field, Kind::Cmp(CmpOp::Lt, value.into()))
}

/// Field value is less than or equal to `value`.
pub fn le(field: &str, value: impl Into<Value>) -> Predicate {
    predicate(field, Kind::Cmp(CmpOp::Le, value.into()))
}

/// Field value is strictly greater than `value`.
pub fn gt(field: &str, value: impl Into<Value>) -> Predicate {
    predicate(field, Kind::Cmp(CmpOp::Gt, value.into()))
}

/// Field value is greater than or equal to `value`.
pub fn ge(field: &str, value: impl Into<Value>) -> Predicate {
    predicate(field, Kind::Cmp(CmpOp::Ge, value.into()))
}

/// Field value is one of `values`.
pub fn in_list<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Predicate {
    predicate(
        field,
        Kind::InList(values.into_iter().map(Into::into).collect()),
    )
}

/// `needle` occurs in the field string, ignoring case.
pub fn in_str(field: &str, needle: &str) -> Predicate {
    predicate(field, Kind::InStr(needle.to_owned()))
}

fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::InvalidRegex {
        pattern: pattern.to_owned(),
        source,
    })
}

/// Field string matches `pattern` anywhere.
///
/// # Errors
///
/// Returns [`FilterError::InvalidRegex`] if the pattern does not compile.
pub fn regexp(field: &str, pattern: &str) -> Result<Predicate, FilterError> {
    Ok(predicate(
        field,
        Kind::Regexp {
            regex: compile(pattern)?,
            negate: false,
        },
    ))
}

/// Field string does not match `pattern` anywhere.
///
/// # Errors
///
/// Returns [`FilterError::InvalidRegex`] if the pattern does not compile.
pub fn not_regexp(field: &str, pattern: &str) -> Result<Predicate, FilterError> {
    Ok(predicate(
        field,
        Kind::Regexp {
            regex: compile(pattern)?,
            negate: true,
        },
    ))
}

/// Arbitrary pure predicate; `name` is only used for logs.
pub fn custom(name: &str, func: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Predicate {
    predicate(name, Kind::Custom(Arc::new(func)))
}

/// Narrow `records` by each predicate in turn.
///
/// Relative order of surviving records is preserved.
///
/// # Errors
///
/// Returns the first [`FilterError`] raised by any predicate.
pub fn apply(records: Vec<Record>, predicates: &[Predicate]) -> Result<Vec<Record>, FilterError> {
    let mut current = records;
    for predicate in predicates {
        let before = current.len();
        let mut kept = Vec::with_capacity(before);
        for record in current {
            if predicate.test(&record)? {
                kept.push(record);
            }
        }
        debug!(filter = %predicate, before, after = kept.len(), "filter applied");
        current = kept;
    }
    Ok(current)
}
