//! Field Robot Trajectory Fusion Engine
//!
//! Command-line entry point: loads a reference map and a recorded run,
//! processes the run and prints the report as JSON on stdout. Logs go to
//! stderr and honor `RUST_LOG`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use fieldtrace::{EngineConfig, EngineContext, FusionPipeline, Recording, ReferenceMap};

#[derive(Debug, Parser)]
#[command(name = "fieldtrace", version, about = "Fuse and segment a recorded field-robot run")]
struct Args {
    /// Reference path map (JSON)
    map: PathBuf,

    /// Recorded run (JSON, one message list per channel)
    recording: PathBuf,

    /// Engine configuration (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> fieldtrace::Result<String> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let map = ReferenceMap::load(&args.map)?;
    let recording = Recording::load(&args.recording)?;

    let context = EngineContext::new(config, map)?;
    let report = FusionPipeline::new(&context).run(&recording)?;
    report.to_json_pretty()
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}
