// data_parallel.rs - One fork-join pass over all stripes per generation
//
// The coordinator thread opens a generation, fans the stripes out over a
// rayon pool sized to the worker count, and the join is the single
// synchronisation point before the swap. Commands are serviced on their own
// thread the whole time. An idle coordinator re-checks its target every
// `poll` even without being woken.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;
use rayon::prelude::*;
use tokio::sync::mpsc;

use crate::boundary::SharedHalo;
use crate::command::{self, Request};
use crate::engine::{Shutdown, spawn_supervisor};
use crate::error::EngineError;
use crate::gate::{GenerationGate, Turn};
use crate::grid::{Buffer, Grid};
use crate::partition::{Stripe, partition};
use crate::step::step_column;

pub(crate) fn launch(
    grid: Grid,
    workers: usize,
    poll: Duration,
    inbox: mpsc::UnboundedReceiver<Request>,
) -> Result<JoinHandle<Result<Shutdown, EngineError>>, EngineError> {
    let stripes = partition(grid.width(), workers)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(stripes.len())
        .thread_name(|i| format!("life-stripe-{i}"))
        .build()?;

    let grid = Arc::new(grid);
    let gate = Arc::new(GenerationGate::new(stripes.len()));
    let service = command::spawn_service(inbox, Arc::clone(&gate), Arc::clone(&grid))?;

    spawn_supervisor("life-data-parallel", move || {
        loop {
            match gate.coordinate(&grid, Some(poll)) {
                Turn::Started(generation) => pool.install(|| {
                    stripes
                        .par_iter()
                        .for_each(|stripe| compute_stripe(&grid, &gate, stripe, generation));
                }),
                Turn::Finished(_) => {}
                Turn::Halted => break,
            }
        }

        let workers_released = pool.current_num_threads();
        drop(pool);
        service.join().map_err(|_| EngineError::Panicked("command service"))?;
        Ok(Shutdown {
            generation: gate.current(),
            workers_released,
        })
    })
}

fn compute_stripe(grid: &Grid, gate: &GenerationGate, stripe: &Stripe, generation: u64) {
    let halo = SharedHalo::new(grid);
    for x in stripe.columns() {
        if gate.cancel().is_raised() {
            debug!("stripe {} abandoned generation {generation}", stripe.owner);
            return;
        }
        step_column(&halo, x, |y, alive| {
            grid.set(Buffer::Next, x as isize, y as isize, alive)
        });
    }
    gate.report(stripe.owner, generation);
}
