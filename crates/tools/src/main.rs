use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tools::{Script, load_registry, replay, summarize};

/// Layout validation and scripted replays for the BECI dashboard.
#[derive(Parser)]
#[command(name = "beci", version)]
struct Cli {
    /// Dashboard layout (JSON). Defaults to the built-in layout.
    #[arg(short, long, env = "BECI_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log more (repeat for trace output). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the layout and print a summary.
    Validate,
    /// Print the built-in layout as JSON.
    DefaultConfig,
    /// Replay a JSON script against the layout and print the final state.
    Replay {
        script: PathBuf,
        /// Include every surface call and event, not just the final state.
        #[arg(long)]
        full: bool,
    },
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Validate => {
            let registry = registry(cli.config.as_deref())?;
            print_json(&summarize(&registry))
        }
        Command::DefaultConfig => print_json(&layers::DashboardConfig::beci()),
        Command::Replay { script, full } => {
            let registry = Arc::new(registry(cli.config.as_deref())?);
            let raw = fs::read_to_string(&script)
                .with_context(|| format!("read {}", script.display()))?;
            let script: Script = serde_json::from_str(&raw)
                .with_context(|| format!("parse {}", script.display()))?;
            let mut report = replay(registry, &script);
            if !full {
                report.events.clear();
                report.surface.calls.clear();
            }
            print_json(&report)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn registry(path: Option<&Path>) -> Result<layers::Registry> {
    let raw = match path {
        Some(p) => Some(fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?),
        None => None,
    };
    load_registry(raw.as_deref()).context("invalid dashboard layout")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
