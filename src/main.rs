//! pdh CLI entry point.
//!
//! Provides `config`, `version`, `user` and `inc` subcommands on top of the
//! library's record pipeline.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};

use pdh::commands::{self, incidents, CommandError, ListOptions};
use pdh::config::{expand_home, PdhConfig};
use pdh::markup::escape;
use pdh::output::{print_items, print_markup, RenderOptions, RenderTarget};
use pdh::pagerduty::{ApiError, HttpPagerDuty, IncidentQuery, PagerDutyApi, STATUS_ACK, STATUS_RESOLVED};
use pdh::record::{value_to_display, Record};
use pdh::rules::{into_records, RuleRunner};

/// PagerDuty for Humans: filter, transform and act on incidents.
#[derive(Parser)]
#[command(name = "pdh", version, about)]
struct Cli {
    /// Config file (default: $PDH_CONFIG or ~/.config/pdh.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the configuration interactively.
    Config,
    /// Print the version.
    Version,
    /// Work with users.
    #[command(subcommand)]
    User(UserCommand),
    /// Work with incidents.
    #[command(subcommand)]
    Inc(IncCommand),
}

#[derive(Subcommand)]
enum UserCommand {
    /// List users.
    Ls {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Retrieve a user by name or ID.
    Get {
        /// Name (partial, case-insensitive) or ID.
        user: String,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Subcommand)]
enum IncCommand {
    /// List incidents.
    Ls(IncListArgs),
    /// Acknowledge incidents.
    Ack {
        /// Incident IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Resolve incidents.
    Resolve {
        /// Incident IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Snooze incidents for a duration in seconds.
    Snooze {
        /// Snooze duration in seconds.
        #[arg(short, long, default_value_t = incidents::DEFAULT_SNOOZE_SECS)]
        duration: u64,
        /// Incident IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Reassign incidents to another user.
    Reassign {
        /// User name or email to assign to (partial match).
        #[arg(short, long)]
        user: String,
        /// Incident IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Run each rule independently on open incidents.
    Apply {
        /// Directory of rules to run.
        #[arg(short, long)]
        path: Option<String>,
        /// Single rule to run; repeatable.
        #[arg(short, long = "script")]
        scripts: Vec<PathBuf>,
        /// Restrict to these incident IDs.
        ids: Vec<String>,
        /// Output format.
        #[arg(short, long, value_enum)]
        output: Option<RenderTarget>,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output format.
    #[arg(short, long, value_enum)]
    output: Option<RenderTarget>,
    /// Comma separated fields to show.
    #[arg(short, long)]
    fields: Option<String>,
}

#[derive(Args)]
struct IncListArgs {
    /// List all incidents, not only those assigned to me.
    #[arg(short, long)]
    everything: bool,
    /// Only incidents assigned to this user (name or email).
    #[arg(short, long)]
    user: Option<String>,
    /// Only newly triggered incidents.
    #[arg(short, long)]
    new: bool,
    /// Acknowledge the listed incidents.
    #[arg(short, long)]
    ack: bool,
    /// Snooze the listed incidents for 4 hours.
    #[arg(short, long)]
    snooze: bool,
    /// Resolve the listed incidents.
    #[arg(short, long)]
    resolve: bool,
    /// Only high urgency incidents.
    #[arg(long)]
    high: bool,
    /// Only low urgency incidents.
    #[arg(short, long)]
    low: bool,
    /// Chain the listed incidents through every rule in the rules path.
    #[arg(long)]
    apply: bool,
    /// Directory of rules for --apply.
    #[arg(long)]
    rules_path: Option<String>,
    /// Regular expression the title must match.
    #[arg(short = 'R', long, default_value = "")]
    regexp: String,
    /// Only incidents whose service matches this regular expression.
    #[arg(short = 'S', long)]
    service_re: Option<String>,
    /// Exclude incidents whose service matches this regular expression.
    #[arg(long)]
    excluded_service_re: Option<String>,
    /// Show the alerts of each incident.
    #[arg(long)]
    alerts: bool,
    /// Comma separated alert fields to show.
    #[arg(long)]
    alert_fields: Option<String>,
    #[command(flatten)]
    output: OutputArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    pdh::logging::init_cli(cli.verbose, cli.log_json);

    let config_path = PdhConfig::resolve_path(cli.config.as_deref(), |key| std::env::var(key).ok())?;
    let config = PdhConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    debug!(path = %config_path.display(), "configuration loaded");

    let result = match cli.command {
        Command::Config => handle_config(&config, &config_path),
        Command::Version => {
            println!("pdh {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::User(cmd) => {
            let api = client(&config)?;
            handle_user(&api, &config, cmd).await
        }
        Command::Inc(cmd) => {
            let api = client(&config)?;
            handle_inc(&api, &config, cmd).await
        }
    };
    result.map_err(explain_unauthorized)
}

fn explain_unauthorized(err: anyhow::Error) -> anyhow::Error {
    let unauthorized = err
        .downcast_ref::<CommandError>()
        .is_some_and(CommandError::is_unauthorized)
        || matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized { .. }));
    if unauthorized {
        err.context("PagerDuty rejected the API key, update it with `pdh config`")
    } else {
        err
    }
}

fn client(config: &PdhConfig) -> anyhow::Result<HttpPagerDuty> {
    config.validate()?;
    Ok(HttpPagerDuty::new(config.apikey.clone(), config.email.clone())
        .with_base_url(config.api_url.clone())
        .with_max_attempts(config.http.max_attempts))
}

fn render_options(config: &PdhConfig) -> RenderOptions {
    RenderOptions {
        odd_style: config.output.odd_color.clone(),
        even_style: config.output.even_color.clone(),
        ..RenderOptions::default()
    }
}

/// Options for records that never went through a display projection.
fn verbatim_options(config: &PdhConfig) -> RenderOptions {
    RenderOptions {
        markup: false,
        ..render_options(config)
    }
}

/// Write a new config after prompting, keeping unprompted settings.
fn handle_config(config: &PdhConfig, path: &Path) -> anyhow::Result<()> {
    let updated = config.prompt()?;
    updated.save(path)?;
    print_markup(&format!("[green]Config saved to {}[/green]", escape(&path.display().to_string())));
    Ok(())
}

async fn handle_user(api: &dyn PagerDutyApi, config: &PdhConfig, cmd: UserCommand) -> anyhow::Result<()> {
    let opts = render_options(config);
    match cmd {
        UserCommand::Ls { output } => {
            let target = output.output.unwrap_or(config.output.format);
            let fields = output.fields.as_deref().map(commands::parse_field_list);
            let users = commands::list_users(api, fields.as_deref(), target == RenderTarget::Raw).await?;
            print_items(target, &users, &opts)?;
        }
        UserCommand::Get { user, output } => {
            let target = output.output.unwrap_or(config.output.format);
            let fields = output.fields.as_deref().map(commands::parse_field_list);
            let users =
                commands::get_user(api, &user, fields.as_deref(), target == RenderTarget::Raw).await?;
            print_items(target, &users, &opts)?;
        }
    }
    Ok(())
}

async fn handle_inc(api: &dyn PagerDutyApi, config: &PdhConfig, cmd: IncCommand) -> anyhow::Result<()> {
    match cmd {
        IncCommand::Ls(args) => handle_list(api, config, args).await,
        IncCommand::Ack { ids } => {
            for incident in commands::ack_incidents(api, &ids).await? {
                print_markup(&format!("[yellow]✔[/yellow] {}", describe(&incident)));
            }
            Ok(())
        }
        IncCommand::Resolve { ids } => {
            for incident in commands::resolve_incidents(api, &ids).await? {
                print_markup(&format!("[green]✅[/green] {}", describe(&incident)));
            }
            Ok(())
        }
        IncCommand::Snooze { duration, ids } => {
            for incident in commands::snooze_incidents(api, &ids, duration).await? {
                print_markup(&format!(
                    "Snoozing incident {} for {}",
                    escape(&field(&incident, "id")),
                    format_hms(duration)
                ));
            }
            Ok(())
        }
        IncCommand::Reassign { user, ids } => {
            let (incidents, assignees) = commands::reassign_incidents(api, &ids, &user).await?;
            for incident in incidents {
                print_markup(&format!(
                    "Reassign incident {} to {}",
                    escape(&field(&incident, "id")),
                    escape(&assignees.join(", "))
                ));
            }
            Ok(())
        }
        IncCommand::Apply {
            path,
            scripts,
            ids,
            output,
        } => {
            let target = output.unwrap_or(config.output.format);
            let mut incidents = api.list_incidents(&IncidentQuery::open()).await?;
            if !ids.is_empty() {
                incidents = commands::select_by_ids(incidents, &ids)?;
            }
            let dir = path.map_or_else(|| config.rules_dir(), |p| expand_home(&p));
            let scripts = commands::resolve_rules(Some(&dir), &scripts)?;
            if scripts.is_empty() {
                print_markup(&format!("[yellow]No rules found in {}[/yellow]", escape(&dir.display().to_string())));
                return Ok(());
            }

            let runner = RuleRunner::new(config.rule_timeout());
            for report in commands::run_rules_each(&runner, &incidents, &scripts).await {
                print_markup(&format!(
                    "[green]Applied rule:[/green] {}",
                    escape(&report.script.display().to_string())
                ));
                match report.result {
                    Err(e) => print_markup(&format!("[red]Error:[/red] {}", escape(&e.to_string()))),
                    Ok(Value::String(text)) => println!("{text}"),
                    Ok(value) => print_items(target, &into_records(value), &verbatim_options(config))?,
                }
            }
            Ok(())
        }
    }
}

async fn handle_list(api: &dyn PagerDutyApi, config: &PdhConfig, args: IncListArgs) -> anyhow::Result<()> {
    let target = args.output.output.unwrap_or(config.output.format);
    let opts = ListOptions {
        everything: args.everything,
        user: args.user,
        new_only: args.new,
        high_only: args.high,
        low_only: args.low,
        title_regexp: args.regexp,
        service_regexp: args.service_re,
        excluded_service_regexp: args.excluded_service_re,
        alerts: args.alerts,
    };

    let listed = commands::list_incidents(api, &opts, &config.uid).await?;
    info!(count = listed.len(), "incidents listed");

    let shown = if target == RenderTarget::Raw {
        listed.clone()
    } else {
        let fields = incidents::display_fields(args.output.fields.as_deref(), args.alerts);
        let alert_fields = incidents::alert_fields(args.alert_fields.as_deref());
        commands::project_incidents(listed.clone(), &fields, &alert_fields)?
    };
    print_items(target, &shown, &render_options(config))?;

    let quiet = target.is_structured();
    let ids = commands::record_ids(&listed);
    if args.ack {
        commands::set_status(api, &listed, STATUS_ACK).await?;
        announce(quiet, &ids, |id| format!("Marked {id} as [yellow]ACK[/yellow]"));
    }
    if args.snooze {
        commands::snooze_all(api, &listed, incidents::DEFAULT_SNOOZE_SECS).await?;
        announce(quiet, &ids, |id| format!("Snoozing incident {id} for 4h"));
    }
    if args.resolve {
        commands::set_status(api, &listed, STATUS_RESOLVED).await?;
        announce(quiet, &ids, |id| format!("Mark {id} as [green]RESOLVED[/green]"));
    }

    if args.apply {
        let dir = args
            .rules_path
            .as_deref()
            .map_or_else(|| config.rules_dir(), expand_home);
        let scripts = commands::resolve_rules(Some(&dir), &[])?;
        if scripts.is_empty() {
            print_markup(&format!("[yellow]No rules found in {}[/yellow]", escape(&dir.display().to_string())));
            return Ok(());
        }
        let runner = RuleRunner::new(config.rule_timeout());
        let result = commands::run_rules_chained(&runner, &listed, &scripts).await?;
        print_items(target, &result, &verbatim_options(config))?;
    }
    Ok(())
}

fn announce(quiet: bool, ids: &[String], message: impl Fn(&str) -> String) {
    if quiet {
        return;
    }
    for id in ids {
        print_markup(&message(&escape(id)));
    }
}

fn field(record: &Record, key: &str) -> String {
    record.get(key).map(value_to_display).unwrap_or_default()
}

fn describe(incident: &Record) -> String {
    format!(
        "{} [grey50]{}[/grey50]",
        escape(&field(incident, "id")),
        escape(&field(incident, "title"))
    )
}

/// `H:MM:SS` for a duration in seconds.
fn format_hms(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
