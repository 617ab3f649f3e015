// main.rs - Console front end for the generation-gated Life engine
//
// Loads the initial field (a field file, a named pattern or a random fill),
// starts the configured strategy and hands stdin/stdout to the command loop.
// Leaving the loop halts the engine and waits for every worker.

mod repl;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use conway_gate::field::{self, DEFAULT_FIELD};
use conway_gate::patterns;
use conway_gate::{EngineConfig, EngineError, Grid, Strategy, launch};
use log::{info, warn};

/// Conway's Game of Life on a torus, computed by parallel stripe workers.
#[derive(Parser, Debug)]
#[command(name = "conway", version, about)]
struct Args {
    /// Initial field file: `width height count` followed by `count` pairs `x y`.
    #[arg(default_value = DEFAULT_FIELD)]
    field: PathBuf,

    /// Seed with a named pattern instead of reading the field file.
    #[arg(long, conflicts_with = "random")]
    pattern: Option<String>,

    /// Seed with a reproducible random fill instead of reading the field file.
    #[arg(long, value_name = "SEED")]
    random: Option<u64>,

    /// Grid width for --pattern and --random.
    #[arg(long, default_value_t = 32)]
    width: usize,

    /// Grid height for --pattern and --random.
    #[arg(long, default_value_t = 32)]
    height: usize,

    /// data-parallel, pool or distributed (also openmp, pthread, mpi).
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Number of stripe workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Engine config file (default: ./conway.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("failed to load engine configuration")?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let grid = initial_grid(&args)?;
    let engine = launch(grid, &config).context("failed to start the engine")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    repl::print_title(&mut out, engine.strategy(), engine.workers())?;

    let commands = engine.commands();
    let session = repl::run_io_loop(io::stdin().lock(), &mut out, &commands);

    match commands.halt() {
        Ok(()) | Err(EngineError::Disconnected) => {}
        Err(err) => warn!("halt was not accepted: {err}"),
    }
    let shutdown = engine.join().context("engine failed")?;
    info!(
        "stopped at generation {}, {} workers released",
        shutdown.generation, shutdown.workers_released
    );
    session
}

fn initial_grid(args: &Args) -> Result<Grid> {
    if let Some(name) = &args.pattern {
        let pattern = patterns::find(name)?;
        info!("seeding {}x{} grid with {}", args.width, args.height, pattern.name);
        return Ok(patterns::seeded(pattern, args.width, args.height)?);
    }
    if let Some(seed) = args.random {
        info!("seeding {}x{} grid randomly (seed {seed})", args.width, args.height);
        return Ok(patterns::random(args.width, args.height, seed)?);
    }
    field::load_field(&args.field).with_context(|| format!("cannot set up field from {}", args.field.display()))
}
