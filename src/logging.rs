//! Structured logging setup using `tracing-subscriber`.
//!
//! Logs go to stderr so that stdout stays clean for command output. The
//! level comes from `RUST_LOG` when set, otherwise from the `-v` count.

use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count: none → `warn`, one → `info`, more → `debug`.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Initialise logging for a CLI invocation.
///
/// `RUST_LOG` takes precedence over `verbosity`. With `json`, each event is
/// emitted as one JSON object per line.
pub fn init_cli(verbosity: u8, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
