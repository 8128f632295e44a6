//! Fetch front-end simulator CLI.
//!
//! This binary provides a single entry point for running workloads through
//! the decoupled fetch front-end. It performs:
//! 1. **Workload run:** Load a JSON program image and replay it through the front-end.
//! 2. **Configuration:** Optional JSON config overriding the built-in defaults.
//! 3. **Reporting:** Print the front-end statistics contract after the run.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use fetch_core::Config;
use fetch_core::Simulator;
use fetch_core::sim::trace::Workload;

#[derive(Parser, Debug)]
#[command(
    name = "fetchsim",
    author,
    version,
    about = "Decoupled fetch front-end simulator",
    long_about = "Replay a JSON workload through the decoupled fetch front-end.\n\n\
        The workload describes a program image (instructions keyed by address,\n\
        control flow with true directions and targets, scripted mispredictions).\n\n\
        Examples:\n  fetchsim run -w workloads/loop.json\n  \
        fetchsim run -w workloads/loop.json -c config.json --cycles 100000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workload to completion or a cycle limit.
    Run {
        /// Workload JSON file (program image plus entry PC).
        #[arg(short, long)]
        workload: PathBuf,

        /// Config JSON file; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cycle limit.
        #[arg(long, default_value_t = 1_000_000)]
        cycles: u64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            workload,
            config,
            cycles,
        } => cmd_run(&workload, config.as_deref(), cycles),
    }
}

fn cmd_run(workload_path: &std::path::Path, config_path: Option<&std::path::Path>, cycles: u64) {
    let config = match config_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<Config>(&text) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("error: bad config {}: {e}", path.display());
                    process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("error: cannot read config {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    let workload = match Workload::from_file(workload_path) {
        Ok(workload) => workload,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let mut sim = Simulator::new(&config, &workload);
    let completed = sim.run(cycles);

    sim.print_stats();
    if !completed {
        eprintln!("warning: cycle limit {cycles} reached before workload exit");
        process::exit(2);
    }
}
