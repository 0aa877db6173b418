//! External rule execution.
//!
//! A rule is an executable that reads a JSON document on stdin and writes a
//! JSON document on stdout. Rules are run directly, without a shell. Exit
//! code 0 with parseable stdout is success; anything else stops the chain.
//!
//! [`RuleRunner::chain`] feeds each stage the previous stage's output.
//! [`RuleRunner::apply_each`] runs every rule on the same input and reports
//! each one separately.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::record::Record;

pub mod discover;

pub use discover::discover;

/// Errors produced while running a rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The executable could not be started.
    #[error("failed to start rule {}: {source}", .script.display())]
    Spawn {
        /// Rule path.
        script: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Piping data to or from the rule failed.
    #[error("I/O error talking to rule {}: {source}", .script.display())]
    Io {
        /// Rule path.
        script: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The rule did not finish within the stage timeout.
    #[error("rule {} timed out after {seconds}s", .script.display())]
    Timeout {
        /// Rule path.
        script: PathBuf,
        /// Timeout budget in seconds.
        seconds: u64,
    },
    /// The rule exited unsuccessfully.
    #[error("rule {} failed ({}): {stderr}", .script.display(), exit_label(.code))]
    Execution {
        /// Rule path.
        script: PathBuf,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// The rule succeeded but its stdout is not JSON.
    #[error("rule {} returned invalid output: {source}", .script.display())]
    InvalidOutput {
        /// Rule path.
        script: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The stage input could not be serialized.
    #[error("failed to serialize rule input: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The rules directory could not be read.
    #[error("failed to read rules from {}: {source}", .path.display())]
    Discover {
        /// Directory or entry being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_owned(),
    }
}

impl RuleError {
    /// Path of the rule that failed, when the error concerns one rule.
    pub fn script(&self) -> Option<&Path> {
        match self {
            Self::Spawn { script, .. }
            | Self::Io { script, .. }
            | Self::Timeout { script, .. }
            | Self::Execution { script, .. }
            | Self::InvalidOutput { script, .. } => Some(script),
            Self::Serialize(_) | Self::Discover { .. } => None,
        }
    }
}

/// Outcome of one rule run by [`RuleRunner::apply_each`].
#[derive(Debug)]
pub struct RuleReport {
    /// Rule path.
    pub script: PathBuf,
    /// Parsed output, or the failure.
    pub result: Result<Value, RuleError>,
}

/// Runs rules as child processes.
#[derive(Debug, Clone, Default)]
pub struct RuleRunner {
    timeout: Option<Duration>,
}

impl RuleRunner {
    /// Create a runner; `timeout` bounds each stage, `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Chain `records` through `scripts`.
    ///
    /// # Errors
    ///
    /// See [`RuleRunner::chain`].
    pub async fn apply(&self, records: &[Record], scripts: &[PathBuf]) -> Result<Value, RuleError> {
        let input = Value::Array(records.iter().cloned().map(Value::Object).collect());
        self.chain(&input, scripts).await
    }

    /// Pipe `input` through every script in order.
    ///
    /// Each stage receives the previous stage's parsed output. With no
    /// scripts the input is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; later stages are not started.
    pub async fn chain(&self, input: &Value, scripts: &[PathBuf]) -> Result<Value, RuleError> {
        let mut current = input.clone();
        for (stage, script) in scripts.iter().enumerate() {
            info!(script = %script.display(), stage, "running rule");
            current = self.run_stage(script, &current).await?;
        }
        Ok(current)
    }

    /// Run every script on the same `input`, independently.
    ///
    /// A failing script does not prevent the others from running.
    pub async fn apply_each(&self, input: &Value, scripts: &[PathBuf]) -> Vec<RuleReport> {
        let mut reports = Vec::with_capacity(scripts.len());
        for script in scripts {
            info!(script = %script.display(), "running rule");
            let result = self.run_stage(script, input).await;
            if let Err(e) = &result {
                warn!(script = %script.display(), error = %e, "rule failed");
            }
            reports.push(RuleReport {
                script: script.clone(),
                result,
            });
        }
        reports
    }

    async fn run_stage(&self, script: &Path, input: &Value) -> Result<Value, RuleError> {
        let payload = serde_json::to_vec(input).map_err(RuleError::Serialize)?;
        let started = Instant::now();

        let mut child = Command::new(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuleError::Spawn {
                script: script.to_path_buf(),
                source,
            })?;

        let io_error = |source: std::io::Error| RuleError::Io {
            script: script.to_path_buf(),
            source,
        };

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io_error(std::io::Error::other("stdin was not captured")))?;
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        });

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RuleError::Timeout {
                    script: script.to_path_buf(),
                    seconds: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(io_error)?;

        match writer.await {
            Ok(Ok(())) => {}
            // A rule may exit without consuming its input.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(io_error(e)),
            Err(e) => return Err(io_error(std::io::Error::other(e))),
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        debug!(
            script = %script.display(),
            exit_code = ?output.status.code(),
            elapsed = ?started.elapsed(),
            stderr_bytes = stderr.len(),
            "rule finished"
        );

        if !output.status.success() {
            return Err(RuleError::Execution {
                script: script.to_path_buf(),
                code: output.status.code(),
                stderr,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| RuleError::InvalidOutput {
            script: script.to_path_buf(),
            source,
        })
    }
}

/// Normalize a rule's output into displayable records.
///
/// An object is one record; arrays keep their objects and wrap any other
/// item as `{"output": item}`; a scalar becomes `[{"output": scalar}]`.
pub fn into_records(value: Value) -> Vec<Record> {
    fn wrap(value: Value) -> Record {
        let mut record = Map::new();
        record.insert("output".to_owned(), value);
        record
    }

    match value {
        Value::Object(record) => vec![record],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => record,
                other => wrap(other),
            })
            .collect(),
        scalar => vec![wrap(scalar)],
    }
}
