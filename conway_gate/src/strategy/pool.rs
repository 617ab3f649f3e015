// pool.rs - Long-lived stripe workers meeting at a barrier
//
// Each worker sleeps on its own wake condition until the gate opens the
// generation after its local marker, computes its stripe straight from the
// shared grid and bumps the marker. The coordinator thread is the only one
// that swaps buffers and moves `current`; it does so once every marker has
// caught up.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::boundary::SharedHalo;
use crate::command::{self, Request};
use crate::engine::{Shutdown, spawn_supervisor};
use crate::error::EngineError;
use crate::gate::{GenerationGate, Turn};
use crate::grid::{Buffer, Grid};
use crate::partition::{Stripe, partition};
use crate::step::step_column;

/// One persistent worker thread and the stripe it owns.
struct WorkerHandle {
    stripe: Stripe,
    thread: JoinHandle<()>,
}

pub(crate) fn launch(
    grid: Grid,
    workers: usize,
    inbox: mpsc::UnboundedReceiver<Request>,
) -> Result<JoinHandle<Result<Shutdown, EngineError>>, EngineError> {
    let stripes = partition(grid.width(), workers)?;
    let grid = Arc::new(grid);
    let gate = Arc::new(GenerationGate::new(stripes.len()));

    let mut handles = Vec::with_capacity(stripes.len());
    for stripe in stripes {
        let spawned = spawn_worker(stripe, Arc::clone(&grid), Arc::clone(&gate));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                // Nothing may keep running after a failed setup.
                gate.halt();
                release(handles);
                return Err(err);
            }
        }
    }

    let service = match command::spawn_service(inbox, Arc::clone(&gate), Arc::clone(&grid)) {
        Ok(service) => service,
        Err(err) => {
            gate.halt();
            release(handles);
            return Err(err);
        }
    };

    spawn_supervisor("life-pool", move || {
        while gate.coordinate(&grid, None) != Turn::Halted {}

        let workers_released = release(handles);
        service.join().map_err(|_| EngineError::Panicked("command service"))?;
        Ok(Shutdown {
            generation: gate.current(),
            workers_released,
        })
    })
}

fn spawn_worker(stripe: Stripe, grid: Arc<Grid>, gate: Arc<GenerationGate>) -> Result<WorkerHandle, EngineError> {
    let thread = thread::Builder::new()
        .name(format!("life-worker-{}", stripe.owner))
        .spawn(move || run_worker(&stripe, &grid, &gate))
        .map_err(|source| EngineError::Spawn {
            what: "stripe worker",
            source,
        })?;
    Ok(WorkerHandle { stripe, thread })
}

fn run_worker(stripe: &Stripe, grid: &Grid, gate: &GenerationGate) {
    let halo = SharedHalo::new(grid);
    while let Some(generation) = gate.wait_for_generation(stripe.owner) {
        for x in stripe.columns() {
            if gate.cancel().is_raised() {
                return;
            }
            step_column(&halo, x, |y, alive| {
                grid.set(Buffer::Next, x as isize, y as isize, alive)
            });
        }
        if !gate.report(stripe.owner, generation) {
            return;
        }
    }
}

/// Joins every worker. Returns how many exited cleanly.
fn release(handles: Vec<WorkerHandle>) -> usize {
    let mut released = 0;
    for handle in handles {
        match handle.thread.join() {
            Ok(()) => {
                debug!("worker {} released", handle.stripe.owner);
                released += 1;
            }
            Err(_) => warn!("worker {} panicked", handle.stripe.owner),
        }
    }
    released
}
