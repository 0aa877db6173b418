//! Record set rendering.
//!
//! [`render`] dispatches on a [`RenderTarget`]:
//! - `table`: columns from the first record's keys, rows striped by parity
//! - `json` / `yaml`: the whole list, markup stripped
//! - `plain`: one line per record, caller-supplied formatter or tab-joined values
//! - `raw`: pretty JSON of the records as they are, for untransformed API data
//!
//! Markup is only ever read from top-level string values, and only when
//! [`RenderOptions::markup`] is set. Records that did not come out of a
//! presentation projection (rule output, for one) must be rendered with it
//! unset so their text is shown and serialized verbatim.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::markup::{self, escape};
use crate::record::{value_to_display, Record};

pub mod table;

pub use table::{build_table, table_layout};

/// Default style of even-indexed table rows (the first row is index 0).
pub const DEFAULT_EVEN_STYLE: &str = "grey50 on black";
/// Default style of odd-indexed table rows.
pub const DEFAULT_ODD_STYLE: &str = "grey93 on black";

/// Errors produced while rendering.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// JSON encoding failed.
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// YAML encoding failed.
    #[error("failed to encode YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Writing to the terminal failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Selected output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RenderTarget {
    /// Striped table.
    #[default]
    Table,
    /// Compact JSON array.
    Json,
    /// YAML sequence.
    Yaml,
    /// One line per record.
    Plain,
    /// Untransformed records as pretty JSON.
    Raw,
}

impl RenderTarget {
    /// Whether the format is meant for machines rather than people.
    pub fn is_structured(self) -> bool {
        matches!(self, Self::Json | Self::Yaml)
    }
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Plain => "plain",
            Self::Raw => "raw",
        })
    }
}

impl FromStr for RenderTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "plain" => Ok(Self::Plain),
            "raw" => Ok(Self::Raw),
            other => Err(format!(
                "unknown output format '{other}', expected one of: table, json, yaml, plain, raw"
            )),
        }
    }
}

/// Per-record line formatter for the `plain` target.
pub type PlainFormatter = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// Caller-controlled rendering parameters.
#[derive(Clone)]
pub struct RenderOptions {
    /// Columns left out of the table.
    pub skip_columns: Vec<String>,
    /// Line formatter for the `plain` target.
    pub plain_formatter: Option<PlainFormatter>,
    /// Style markup of odd-indexed rows.
    pub odd_style: String,
    /// Style markup of even-indexed rows.
    pub even_style: String,
    /// Top-level string values carry escaped markup.
    pub markup: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            skip_columns: Vec::new(),
            plain_formatter: None,
            odd_style: DEFAULT_ODD_STYLE.to_owned(),
            even_style: DEFAULT_EVEN_STYLE.to_owned(),
            markup: true,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("skip_columns", &self.skip_columns)
            .field("plain_formatter", &self.plain_formatter.is_some())
            .field("odd_style", &self.odd_style)
            .field("even_style", &self.even_style)
            .field("markup", &self.markup)
            .finish()
    }
}

/// Markup form of a value: markup strings as they are, everything else
/// escaped display text.
#[doc(hidden)]
pub fn cell_text(value: &Value, markup: bool) -> String {
    match value {
        Value::String(s) if markup => s.clone(),
        other => escape(&value_to_display(other)),
    }
}

fn stripped(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .map(|r| {
            r.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => Value::String(markup::strip(s)),
                        other => other.clone(),
                    };
                    (k.clone(), v)
                })
                .collect()
        })
        .collect()
}

fn plain_line(record: &Record, markup: bool) -> String {
    record
        .values()
        .map(|v| cell_text(v, markup))
        .collect::<Vec<_>>()
        .join("\t")
}

/// Render `records` as text for `target`.
///
/// An empty record set renders as an empty table.
///
/// # Errors
///
/// Returns [`OutputError`] when a structured encoding fails.
pub fn render(target: RenderTarget, records: &[Record], opts: &RenderOptions) -> Result<String, OutputError> {
    let text = match target {
        RenderTarget::Table => {
            if records.is_empty() {
                return Ok(String::new());
            }
            let (headers, rows) = table_layout(records, &opts.skip_columns, opts.markup);
            build_table(&headers, &rows, &opts.odd_style, &opts.even_style).to_string()
        }
        RenderTarget::Json if opts.markup => serde_json::to_string(&stripped(records))?,
        RenderTarget::Json => serde_json::to_string(records)?,
        RenderTarget::Yaml if opts.markup => serde_yaml::to_string(&stripped(records))?,
        RenderTarget::Yaml => serde_yaml::to_string(records)?,
        RenderTarget::Raw => serde_json::to_string_pretty(records)?,
        RenderTarget::Plain => records
            .iter()
            .map(|r| match &opts.plain_formatter {
                Some(format) if opts.markup => markup::render(&format(r)),
                Some(format) => format(r),
                None => markup::render(&plain_line(r, opts.markup)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    Ok(text)
}

/// Render `records` and write them to stdout.
///
/// # Errors
///
/// Returns [`OutputError`] on encoding or write failure.
pub fn print_items(target: RenderTarget, records: &[Record], opts: &RenderOptions) -> Result<(), OutputError> {
    let text = render(target, records, opts)?;
    if text.is_empty() {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text.trim_end_matches('\n'))?;
    Ok(())
}

/// Print a single markup line to stdout.
pub fn print_markup(line: &str) {
    println!("{}", markup::render(line));
}
