// engine.rs - Launching a strategy and waiting for it to wind down

use std::thread::{self, JoinHandle};

use log::{info, warn};

use crate::command::CommandChannel;
use crate::config::{EngineConfig, Strategy};
use crate::error::EngineError;
use crate::grid::Grid;
use crate::strategy::{data_parallel, distributed, pool};

/// How a halted engine ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shutdown {
    /// Last generation that was swapped in.
    pub generation: u64,
    /// Workers that exited and gave their resources back.
    pub workers_released: usize,
}

/// A running simulation. Talk to it through [`commands`](Self::commands).
///
/// Dropping it halts the simulation and blocks until every worker is gone,
/// which also holds when dropped on an async runtime thread.
pub struct Engine {
    strategy: Strategy,
    workers: usize,
    commands: CommandChannel,
    supervisor: Option<JoinHandle<Result<Shutdown, EngineError>>>,
}

/// Starts `config.strategy` on `grid`, clamping the worker count to the grid width.
pub fn launch(grid: Grid, config: &EngineConfig) -> Result<Engine, EngineError> {
    config.validate()?;
    let workers = config.workers.clamp(1, grid.width());
    if workers != config.workers {
        warn!(
            "{} workers requested for a grid {} columns wide, using {workers}",
            config.workers,
            grid.width()
        );
    }
    info!(
        "starting {} engine: {}x{} grid, {workers} workers",
        config.strategy,
        grid.width(),
        grid.height()
    );

    let (commands, inbox) = CommandChannel::new();
    let supervisor = match config.strategy {
        Strategy::DataParallel => data_parallel::launch(grid, workers, config.poll_interval(), inbox)?,
        Strategy::Pool => pool::launch(grid, workers, inbox)?,
        Strategy::Distributed => distributed::launch(grid, workers, config.exchange_timeout(), inbox)?,
    };

    Ok(Engine {
        strategy: config.strategy,
        workers,
        commands,
        supervisor: Some(supervisor),
    })
}

impl Engine {
    pub fn commands(&self) -> CommandChannel {
        self.commands.clone()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Waits for teardown after a halt (or a fatal runtime failure).
    pub fn join(mut self) -> Result<Shutdown, EngineError> {
        self.wait()
    }

    fn wait(&mut self) -> Result<Shutdown, EngineError> {
        let supervisor = self.supervisor.take().ok_or(EngineError::Disconnected)?;
        let shutdown = supervisor
            .join()
            .map_err(|_| EngineError::Panicked("coordinator"))??;
        info!(
            "{} engine stopped at generation {}, {} workers released",
            self.strategy, shutdown.generation, shutdown.workers_released
        );
        Ok(shutdown)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.supervisor.is_none() {
            return;
        }
        // Dropping without a halt: ask for one, then reap the workers. Inside a
        // runtime the blocking acknowledgement would panic, so only queue it.
        let _ = if tokio::runtime::Handle::try_current().is_ok() {
            self.commands.request_halt()
        } else {
            self.commands.halt()
        };
        if let Err(err) = self.wait() {
            warn!("engine dropped with error: {err}");
        }
    }
}

/// Spawns the thread that owns a strategy's coordinator.
pub(crate) fn spawn_supervisor<F>(name: &str, body: F) -> Result<JoinHandle<Result<Shutdown, EngineError>>, EngineError>
where
    F: FnOnce() -> Result<Shutdown, EngineError> + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .map_err(|source| EngineError::Spawn {
            what: "coordinator",
            source,
        })
}
