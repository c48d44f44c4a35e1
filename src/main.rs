//! Entry point for the `glucose-monitor` status bar widget.
//!
//! This binary orchestrates the widget lifecycle:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing (to stderr)
//! - Building the Nightscout client for the configured endpoint
//! - Running the poll scheduler and writing one JSON line per update to stdout
//!
//! # Commands
//! - `run` (default) – poll forever; `SIGUSR1` forces a refresh,
//!   Ctrl-C or `SIGTERM` stops cleanly
//! - `once` – fetch and print a single update, exit non-zero on failure
//! - `click <left|middle|right>` – perform the action bound to a button
//!
//! `--output <waybar|json|log>` selects how `run` and `once` show updates:
//! Waybar lines, the whole update as JSON, or log records only.
//!
//! # Environment Variables
//! See [`glucose_monitor::config::load_from_env`] for the widget settings, plus:
//! - `CGM_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `CGM_SPAN_EVENTS` (optional) – span event mode for tracing
use std::env;
use std::process::ExitCode;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use glucose_monitor::actions::{self, MouseButton};
use glucose_monitor::config;
use glucose_monitor::scheduler::{self, PollScheduler, TriggerOutcome};
use glucose_monitor::sink::{self, DisplaySink, JsonSink, LogSink, WaybarSink};
use glucose_monitor::{Config, NightscoutClient};

// ---

#[derive(Debug, Parser)]
#[command(name = "glucose-monitor", version, about = "Nightscout glucose widget")]
struct Cli {
    /// How updates are shown
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Waybar)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `{"text", "tooltip", "class"}` lines for a status bar
    Waybar,
    /// The whole update: field values, label segments and tooltip
    Json,
    /// Log records on stderr, nothing on stdout
    Log,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll on an interval and stream updates to stdout
    Run,
    /// Fetch a single update and print it
    Once,
    /// Perform the action bound to a mouse button
    Click {
        #[arg(value_enum)]
        button: MouseButton,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_from_env()?;
    cfg.log_config();

    match (cli.command.unwrap_or(Command::Run), cli.output) {
        (Command::Run, OutputFormat::Waybar) => run(cfg, WaybarSink).await,
        (Command::Run, OutputFormat::Json) => run(cfg, JsonSink).await,
        (Command::Run, OutputFormat::Log) => run(cfg, LogSink).await,
        (Command::Once, OutputFormat::Waybar) => once(cfg, WaybarSink).await,
        (Command::Once, OutputFormat::Json) => once(cfg, JsonSink).await,
        (Command::Once, OutputFormat::Log) => once(cfg, LogSink).await,
        (Command::Click { button }, _) => {
            let action = cfg.callbacks.action_for(button);
            actions::perform(action, cfg.endpoint.host())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---

async fn run<K: DisplaySink>(cfg: Config, sink: K) -> Result<ExitCode> {
    // ---
    let client = NightscoutClient::new(cfg.endpoint.clone(), cfg.request_timeout)?;
    let scheduler = PollScheduler::start(
        client,
        sink,
        cfg.render_settings(),
        cfg.poll_interval,
    );

    wait_for_shutdown(&scheduler).await?;
    scheduler.stop().await;
    Ok(ExitCode::SUCCESS)
}

/// A failed cycle is reported through the sink only; the exit code carries
/// the failure so the message is not printed a second time.
async fn once<K: DisplaySink>(cfg: Config, sink: K) -> Result<ExitCode> {
    // ---
    let client = NightscoutClient::new(cfg.endpoint.clone(), cfg.request_timeout)?;
    let outcome = scheduler::run_once(&client, &cfg.render_settings(), Utc::now()).await;
    if sink::deliver(&sink, &outcome) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Block until Ctrl-C or `SIGTERM`, turning `SIGUSR1` into manual refreshes.
#[cfg(unix)]
async fn wait_for_shutdown<K: DisplaySink>(
    scheduler: &PollScheduler<NightscoutClient, K>,
) -> Result<()> {
    // ---
    use tokio::signal::unix::{signal, SignalKind};

    let mut refresh = signal(SignalKind::user_defined1())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
            _ = refresh.recv() => {
                if scheduler.trigger() == TriggerOutcome::Coalesced {
                    tracing::debug!("Refresh requested while a fetch is in flight");
                }
            }
        }
    }
    tracing::info!("Shutdown requested");
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown<K: DisplaySink>(
    _scheduler: &PollScheduler<NightscoutClient, K>,
) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    Ok(())
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Output on stderr, since stdout carries the widget's JSON lines
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `CGM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `CGM_LOG_LEVEL` env var
///
/// This should be called once at startup before any logging or tracing
/// macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("CGM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to CGM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("CGM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},reqwest=warn,hyper_util=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
