// gate.rs - Generation counters and the barrier that guards them
//
// `GateState` is the bare state machine. The distributed coordinator owns one
// outright; the shared-memory strategies wrap it in a `GenerationGate`, which
// adds the lock, the wake conditions and the cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use log::{Level, debug, info, log_enabled, warn};

use crate::command::{self, Command, Reply};
use crate::error::GateError;
use crate::grid::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing in flight.
    Idle,
    /// Generation `current + 1` is being computed.
    Advancing,
    /// Terminal.
    Halting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateState {
    current: u64,
    required: u64,
    workers: usize,
    done: usize,
    phase: Phase,
}

impl GateState {
    pub fn new(workers: usize) -> Self {
        Self {
            current: 0,
            required: 0,
            workers,
            done: 0,
            phase: Phase::Idle,
        }
    }

    /// Completed generations.
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Cumulative target.
    pub fn required(&self) -> u64 {
        self.required
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_halting(&self) -> bool {
        self.phase == Phase::Halting
    }

    /// The generation being computed, if any.
    pub fn in_flight(&self) -> Option<u64> {
        (self.phase == Phase::Advancing).then_some(self.current + 1)
    }

    pub fn all_done(&self) -> bool {
        self.phase == Phase::Advancing && self.done == self.workers
    }

    /// Stripes still outstanding for the generation in flight.
    pub fn pending(&self) -> usize {
        if self.phase == Phase::Advancing {
            self.workers - self.done
        } else {
            0
        }
    }

    /// Raises the target by `n`. Returns the new target.
    pub fn advance(&mut self, n: i64) -> Result<u64, GateError> {
        if self.is_halting() {
            return Err(GateError::Halted);
        }
        if n <= 0 {
            return Err(GateError::InvalidAdvance(n));
        }
        self.required = self
            .required
            .checked_add(n as u64)
            .ok_or(GateError::TargetOverflow {
                required: self.required,
                n,
            })?;
        Ok(self.required)
    }

    /// Lets a generation already in flight finish and cancels everything after it.
    /// Returns the new target.
    pub fn stop_after_current(&mut self) -> Result<u64, GateError> {
        let cap = match self.phase {
            Phase::Halting => return Err(GateError::Halted),
            Phase::Advancing => self.current + 1,
            Phase::Idle => self.current,
        };
        self.required = self.required.min(cap);
        Ok(self.required)
    }

    pub fn halt(&mut self) {
        self.phase = Phase::Halting;
    }

    /// Opens the next generation when idle and behind target.
    pub fn begin(&mut self) -> Option<u64> {
        if self.phase == Phase::Idle && self.current < self.required {
            self.phase = Phase::Advancing;
            self.done = 0;
            Some(self.current + 1)
        } else {
            None
        }
    }

    /// Records one stripe of `generation` as written. Returns whether that was the last one.
    pub fn complete(&mut self, generation: u64) -> Result<bool, GateError> {
        if self.is_halting() {
            return Err(GateError::Halted);
        }
        match self.in_flight() {
            Some(expected) if expected == generation && self.done < self.workers => {
                self.done += 1;
                Ok(self.done == self.workers)
            }
            expected => Err(GateError::UnexpectedCompletion {
                reported: generation,
                expected: expected.unwrap_or(self.current),
            }),
        }
    }

    /// Publishes the finished generation: runs `swap`, bumps `current` by one
    /// and goes back to idle. Does nothing unless every stripe has reported.
    pub fn finish(&mut self, swap: impl FnOnce()) -> Option<u64> {
        if !self.all_done() {
            return None;
        }
        swap();
        self.current += 1;
        self.done = 0;
        self.phase = Phase::Idle;
        Some(self.current)
    }
}

/// Broadcast shutdown signal, cheap to poll from hot loops.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What the coordinator should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Workers were released to compute this generation.
    Started(u64),
    /// This generation was swapped in and is now current.
    Finished(u64),
    Halted,
}

struct Shared {
    state: GateState,
    /// Last generation each worker finished writing.
    markers: Vec<u64>,
}

/// `GateState` behind a mutex, with one wake condition per worker and one for
/// the coordinator. Every wait re-checks the halt state before sleeping.
pub struct GenerationGate {
    shared: Mutex<Shared>,
    progress: Condvar,
    wake: Vec<Condvar>,
    cancel: CancelFlag,
}

impl GenerationGate {
    pub fn new(workers: usize) -> Self {
        Self {
            shared: Mutex::new(Shared {
                state: GateState::new(workers),
                markers: vec![0; workers],
            }),
            progress: Condvar::new(),
            wake: (0..workers).map(|_| Condvar::new()).collect(),
            cancel: CancelFlag::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // Only counters live behind the lock; they stay consistent across a panic.
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait<'a>(&self, condvar: &Condvar, guard: MutexGuard<'a, Shared>) -> MutexGuard<'a, Shared> {
        condvar.wait(guard).unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wake_workers(&self) {
        for condvar in &self.wake {
            condvar.notify_one();
        }
    }

    pub fn cancel(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn current(&self) -> u64 {
        self.lock().state.current()
    }

    /// Copy of the counters.
    pub fn state(&self) -> GateState {
        self.lock().state.clone()
    }

    /// Each worker's local progress marker.
    pub fn markers(&self) -> Vec<u64> {
        self.lock().markers.clone()
    }

    /// Applies an operator command and wakes whoever it concerns.
    pub fn apply(&self, grid: &Grid, command: Command) -> Result<Reply, GateError> {
        let mut shared = self.lock();
        let reply = command::apply(&mut shared.state, grid, command);
        if shared.state.is_halting() {
            self.cancel.raise();
            drop(shared);
            self.progress.notify_all();
            self.wake_workers();
        } else {
            drop(shared);
            self.progress.notify_all();
        }
        reply
    }

    /// Shorthand for `apply(Command::Halt)` without needing the grid.
    pub fn halt(&self) {
        let mut shared = self.lock();
        shared.state.halt();
        self.cancel.raise();
        drop(shared);
        self.progress.notify_all();
        self.wake_workers();
    }

    /// Worker side: blocks until generation `marker + 1` is open for this worker.
    /// `None` once halting.
    pub fn wait_for_generation(&self, worker: usize) -> Option<u64> {
        let mut shared = self.lock();
        loop {
            if shared.state.is_halting() {
                return None;
            }
            if let Some(generation) = shared.state.in_flight() {
                if shared.markers[worker] + 1 == generation {
                    return Some(generation);
                }
            }
            shared = self.wait(&self.wake[worker], shared);
        }
    }

    /// Worker side: the stripe of `generation` is fully written. Returns `false`
    /// if the report was discarded because the simulation is halting.
    pub fn report(&self, worker: usize, generation: u64) -> bool {
        let mut shared = self.lock();
        match shared.state.complete(generation) {
            Ok(last) => {
                shared.markers[worker] = generation;
                drop(shared);
                if last {
                    self.progress.notify_all();
                }
                true
            }
            Err(GateError::Halted) => false,
            Err(err) => {
                warn!("worker {worker}: {err}");
                false
            }
        }
    }

    /// Coordinator side: blocks until there is something to do and does the
    /// bookkeeping for it. Swaps the grid when a generation completes.
    ///
    /// With `idle = Some(interval)` an idle coordinator re-checks at least that
    /// often; with `None` it sleeps until woken.
    pub fn coordinate(&self, grid: &Grid, idle: Option<Duration>) -> Turn {
        let mut shared = self.lock();
        loop {
            if shared.state.is_halting() {
                return Turn::Halted;
            }
            if let Some(current) = shared.state.finish(|| grid.swap()) {
                if log_enabled!(Level::Debug) {
                    debug!(
                        "generation {current} swapped in (target {}, fingerprint {:016x})",
                        shared.state.required(),
                        grid.snapshot(current).fingerprint()
                    );
                }
                return Turn::Finished(current);
            }
            if let Some(generation) = shared.state.begin() {
                drop(shared);
                self.wake_workers();
                return Turn::Started(generation);
            }
            shared = match idle {
                Some(interval) => {
                    self.progress
                        .wait_timeout(shared, interval)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0
                }
                None => self.wait(&self.progress, shared),
            };
        }
    }
}

impl Drop for GenerationGate {
    fn drop(&mut self) {
        let shared = self.lock();
        info!(
            "gate released at generation {} of {}",
            shared.state.current(),
            shared.state.required()
        );
    }
}
