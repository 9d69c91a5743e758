//! Thin CLI shim over the engine
//!
//! The full CLI shell (requirement parsing, suites, reporting) lives
//! elsewhere; this binary only exercises the engine surface: load a plan
//! file, run it, mirror the verdict in the exit code.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use webpilot::{load_config, Engine, ReqId, RunRequest};

#[derive(Parser)]
#[command(name = "webpilot", version, about = "Autonomous browser test execution engine")]
struct Cli {
    /// Optional config file layered under the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON log lines instead of compact text.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a plan file (JSON `RunRequest`).
    Run {
        /// Path to the plan JSON.
        plan: PathBuf,

        /// `key=value` variable overrides for `${var}` templates.
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
    /// Resume a checkpointed run by request id.
    Resume {
        req_id: String,
    },
    /// Print a stored run record as JSON.
    Show {
        req_id: String,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    webpilot::init_telemetry(cli.json_logs);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "run aborted");
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let engine = Engine::new(config)?;

    // SIGTERM/Ctrl-C propagate cancellation; in-flight runs flush a final
    // checkpoint before the process exits.
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(_) => return,
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        cancel.cancel();
    });

    let code = match cli.command {
        Command::Run { plan, vars } => {
            let raw = std::fs::read_to_string(&plan)
                .with_context(|| format!("reading plan {}", plan.display()))?;
            let request: RunRequest =
                serde_json::from_str(&raw).context("parsing plan json")?;
            let overrides: BTreeMap<String, String> = vars.into_iter().collect();
            let record = engine
                .run_with_vars(request, &overrides, &BTreeMap::new())
                .await?;
            println!(
                "{} {} steps={}/{} heals={} rca={} ({})",
                record.verdict.name(),
                record.req_id,
                record.steps_executed,
                record.steps_total,
                record.heal_rounds,
                record.rca_class.name(),
                record.rca_detail,
            );
            ExitCode::from(record.verdict.exit_code() as u8)
        }
        Command::Resume { req_id } => {
            let record = engine.resume(&ReqId(req_id)).await?;
            println!("{} {}", record.verdict.name(), record.req_id);
            ExitCode::from(record.verdict.exit_code() as u8)
        }
        Command::Show { req_id } => {
            match engine.run_store().load_run(&ReqId(req_id))? {
                Some(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    ExitCode::SUCCESS
                }
                None => {
                    eprintln!("no such run");
                    ExitCode::from(1)
                }
            }
        }
    };

    engine.shutdown().await;
    Ok(code)
}
