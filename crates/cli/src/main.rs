// crates/cli/src/main.rs
//! showrunner CLI binary.
//!
//! Starts a generation job against a showrunner backend and watches it to
//! completion: the optimistic snapshot appears immediately, then each 2s
//! status poll updates a spinner until the job reaches a terminal phase.
//! Exit code 0 on `Completed`, 1 on `Error`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use showrunner_core::{Orchestrator, OrchestratorConfig};
use showrunner_rest::RestTransport;
use showrunner_types::{JobKey, JobKind, Phase, PlayerId};

/// Default backend origin when `--server` is not given.
const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

/// showrunner - start media generation jobs and watch them finish.
#[derive(Debug, Parser)]
#[command(name = "showrunner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a job and watch it to completion.
    Start(StartArgs),
    /// List the job kinds this client knows about.
    Kinds,
}

/// Arguments for the start command.
#[derive(Debug, Args)]
struct StartArgs {
    /// Job kind to start (`debate`, `director_cut`, `supercut`, ...).
    kind: JobKind,

    /// Key within the kind's namespace (conflict id, episode id, entity
    /// name). Singleton kinds (`digest`, `network_search`) may omit it.
    key: Option<String>,

    /// JSON parameter payload forwarded to the start endpoint.
    #[arg(long, default_value = "{}")]
    params: String,

    /// Backend origin.
    #[arg(long, default_value = DEFAULT_SERVER)]
    server: String,

    /// Seconds between status fetches (minimum 1).
    #[arg(long, default_value = "2")]
    poll_interval: u64,

    /// Give up after this many seconds (0 = poll forever).
    #[arg(long, default_value = "1800")]
    max_duration: u64,

    /// Claim this player slot once the job completes.
    #[arg(long)]
    player: Option<PlayerId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (quiet by default; progress UX uses eprintln)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,showrunner_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Start(args) => run_start(args).await,
        Command::Kinds => {
            for kind in JobKind::ALL {
                if kind.is_singleton() {
                    println!("{kind}  (singleton)");
                } else {
                    println!("{kind}");
                }
            }
            Ok(())
        }
    }
}

async fn run_start(args: StartArgs) -> Result<()> {
    // Step 1: Resolve the slot key. Singleton kinds have a fixed one.
    let key = match args.key.as_deref() {
        Some(key) => JobKey::new(key),
        None if args.kind.is_singleton() => JobKey::singleton(),
        None => anyhow::bail!(
            "kind '{}' needs a key (a conflict id, episode id, or entity name)",
            args.kind
        ),
    };

    let params: Value = serde_json::from_str(&args.params)
        .with_context(|| format!("--params is not valid JSON: {}", args.params))?;

    // Step 2: Wire the facade to the REST transport.
    let config = OrchestratorConfig {
        poll_interval: Duration::from_secs(args.poll_interval.max(1)),
        max_job_duration: (args.max_duration > 0).then(|| Duration::from_secs(args.max_duration)),
    };
    let orchestrator =
        Orchestrator::with_transport(Arc::new(RestTransport::new(args.server.clone())), config);

    // Step 3: Subscribe before starting so no snapshot is missed.
    let mut updates = orchestrator.subscribe(args.kind, &key);
    orchestrator.start_job(args.kind, key.clone(), params);
    tracing::debug!(kind = %args.kind, key = %key, server = %args.server, "job dispatched");

    // Print banner
    eprintln!("\n\u{1f3ac} showrunner v{}\n", env!("CARGO_PKG_VERSION"));
    eprintln!("  \u{2192} {} '{}' via {}\n", args.kind, key, args.server);

    // Step 4: Drive the spinner from snapshot updates until terminal.
    let started = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .expect("valid spinner template"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("{} '{}' starting...", args.kind, key));

    loop {
        updates.changed().await.context("job registry closed")?;
        let snapshot = updates.borrow_and_update().clone();
        let Some(snapshot) = snapshot else {
            pb.finish_and_clear();
            anyhow::bail!("job '{key}' was removed before it finished");
        };

        match snapshot.phase {
            Phase::Completed => {
                pb.finish_and_clear();
                eprintln!(
                    "  \u{2713} {} '{}' completed in {}",
                    args.kind,
                    key,
                    format_elapsed(started.elapsed()),
                );
                // Result payload goes to stdout; everything else is chrome.
                if let Some(result) = snapshot.result {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                if let Some(player) = args.player {
                    orchestrator.activate_player(player);
                    eprintln!("  \u{25b6} player '{player}' active");
                }
                return Ok(());
            }
            Phase::Error => {
                pb.finish_and_clear();
                let detail = snapshot
                    .error_detail
                    .unwrap_or_else(|| snapshot.message.clone());
                eprintln!("  \u{2717} {} '{}' failed: {detail}", args.kind, key);
                anyhow::bail!("job failed: {detail}");
            }
            Phase::Pending | Phase::Processing(_) => {
                pb.set_message(format!(
                    "{} '{}': {} ({}%)",
                    args.kind, key, snapshot.message, snapshot.progress,
                ));
            }
        }
    }
}

/// Compact elapsed-time formatting for the completion line.
fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 1 {
        format!("{}ms", d.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

// =============================================================================
// Tests
// =============================================================================
