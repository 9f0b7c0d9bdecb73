//! # lr-hook
//!
//! The thin stdin/stdout adapter between the agent host and the policy
//! engine. Invoked once per tool use:
//!
//! - stdin:  one JSON record `{tool_name, tool_input, tool_output,
//!   session_id, agent_role}` — every field optional
//! - stdout: one JSON record `{"exitCode": 0|1|2, "stderr": "..."}`
//! - exit code: 0 = allow, 2 = block, 1 = adapter failure (reserved —
//!   the enforcement logic itself never returns it)
//!
//! Diagnostics go to stderr so stdout stays a pure JSON channel.

use std::io::Read;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;

use lr_action::ToolEvent;
use lr_engine::{Decision, DecisionRecord, Engine, EngineConfig};
use lr_store::Store;

/// labrail enforcement hook — evaluates one tool invocation.
#[derive(Parser)]
#[command(name = "lr-hook", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Override the SQLite store location.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            // Adapter-level failure: still emit a well-formed record.
            eprintln!("lr-hook adapter error: {err:#}");
            println!("{}", serde_json::json!({ "exitCode": 1 }));
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("reading event from stdin")?;

    // Malformed input is handled permissively: a record we cannot parse
    // at all becomes an empty event, which classifies to nothing and
    // violates nothing.
    let event: ToolEvent = if raw.trim().is_empty() {
        ToolEvent::default()
    } else {
        match serde_json::from_str(&raw) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "unparseable event, treating as empty");
                ToolEvent::default()
            }
        }
    };

    let project_root = cli
        .project_root
        .canonicalize()
        .unwrap_or_else(|_| cli.project_root.clone());
    let mut config = EngineConfig::for_project(&project_root);
    if let Some(db_path) = &cli.db_path {
        config.db_path = db_path.clone();
    }

    // An unopenable store is an infrastructure problem, not a violation:
    // enforcement is degraded for this invocation and the action proceeds.
    let store = match Store::open(&config.db_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!(
                "[lr-hook] WARNING: cannot open store at {}: {err}. \
                 Enforcement degraded — gates and logging disabled for this tool use.",
                config.db_path.display()
            );
            println!("{}", serde_json::json!({ "exitCode": 0 }));
            return Ok(0);
        }
    };

    let engine = Engine::new(store, config);
    let decision = engine.evaluate(&event);

    let record = DecisionRecord::from(&decision);
    println!(
        "{}",
        serde_json::to_string(&record).context("serializing decision record")?
    );
    match &decision {
        Decision::Block { reason } => eprintln!("{reason}"),
        Decision::Allow { warnings } => {
            for warning in warnings {
                eprintln!("[lr-hook] WARNING: {warning}");
            }
        }
    }

    Ok(record.exit_code)
}
