// distributed.rs - Stripe workers that share nothing with the coordinator
//
// Each worker is a tokio task holding only its stripe and two halo columns.
// Before every generation the coordinator sends it a stop flag and both
// boundary columns; the worker steps and sends its whole stripe back. The
// coordinator keeps the authoritative grid, writes returned stripes into the
// next buffer and swaps once every stripe is in. Operator commands are
// serviced between (and during) generations without waiting on workers.

use std::thread::JoinHandle;
use std::time::Duration;

use log::{Level, debug, error, log_enabled, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::boundary::{self, HaloStripe, Side};
use crate::command::{self, Request};
use crate::engine::{Shutdown, spawn_supervisor};
use crate::error::{EngineError, ExchangeError};
use crate::gate::GateState;
use crate::grid::{Buffer, Grid};
use crate::partition::{Stripe, partition};
use crate::wire::{Message, PROTOCOL_VERSION, Reply};

/// Room for one generation's worth of traffic plus a stop flag.
const INBOX_DEPTH: usize = 4;

pub(crate) fn launch(
    grid: Grid,
    workers: usize,
    timeout: Duration,
    requests: mpsc::UnboundedReceiver<Request>,
) -> Result<JoinHandle<Result<Shutdown, EngineError>>, EngineError> {
    let stripes = partition(grid.width(), workers)?;
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(stripes.len());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name("life-remote")
        .enable_all()
        .build()
        .map_err(|source| EngineError::Spawn {
            what: "worker runtime",
            source,
        })?;

    spawn_supervisor("life-distributed", move || {
        runtime.block_on(async move {
            let coordinator = Coordinator::start(grid, stripes, timeout, requests, run_remote_worker).await?;
            coordinator.run().await
        })
    })
}

/// Coordinator-side view of one worker.
struct Remote {
    stripe: Stripe,
    outbox: mpsc::Sender<Message>,
    task: tokio::task::JoinHandle<()>,
}

struct Coordinator {
    grid: Grid,
    gate: GateState,
    remotes: Vec<Remote>,
    /// Which stripes of the generation in flight have come back.
    received: Vec<bool>,
    replies: mpsc::Receiver<Reply>,
    requests: mpsc::UnboundedReceiver<Request>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Coordinator {
    /// Spawns one `worker` task per stripe and hands out generation 0.
    async fn start<W, F>(
        grid: Grid,
        stripes: Vec<Stripe>,
        timeout: Duration,
        requests: mpsc::UnboundedReceiver<Request>,
        worker: W,
    ) -> Result<Self, EngineError>
    where
        W: Fn(usize, mpsc::Receiver<Message>, mpsc::Sender<Reply>, Duration) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        let (reply_tx, replies) = mpsc::channel(stripes.len() * 2);
        let remotes: Vec<_> = stripes
            .into_iter()
            .map(|stripe| {
                let (outbox, inbox) = mpsc::channel(INBOX_DEPTH);
                let task = tokio::spawn(worker(stripe.owner, inbox, reply_tx.clone(), timeout));
                Remote { stripe, outbox, task }
            })
            .collect();
        drop(reply_tx);

        let mut coordinator = Self {
            gate: GateState::new(remotes.len()),
            received: vec![false; remotes.len()],
            grid,
            remotes,
            replies,
            requests,
            timeout,
            deadline: None,
        };
        if let Err(err) = coordinator.distribute().await {
            coordinator.release().await;
            return Err(err);
        }
        Ok(coordinator)
    }

    async fn run(mut self) -> Result<Shutdown, EngineError> {
        let outcome = self.serve().await;
        if let Err(err) = &outcome {
            error!("distributed coordinator halting: {err}");
            self.gate.halt();
        }
        let generation = self.gate.current();
        let workers_released = self.release().await;
        outcome.map(|()| Shutdown {
            generation,
            workers_released,
        })
    }

    /// Sends every worker its geometry and generation-0 cells.
    async fn distribute(&self) -> Result<(), EngineError> {
        for remote in &self.remotes {
            send(
                remote,
                Message::InitialGeometry {
                    version: PROTOCOL_VERSION,
                    height: self.grid.height(),
                    stripe: remote.stripe,
                },
            )
            .await?;
            let cells = self.grid.stripe_cells(Buffer::Current, &remote.stripe);
            send(remote, Message::InitialData { cells }).await?;
        }
        Ok(())
    }

    /// Opens `generation` on every worker and hands out the halo columns.
    async fn dispatch(&mut self, generation: u64) -> Result<(), EngineError> {
        self.received.fill(false);
        for remote in &self.remotes {
            let (left, right) = boundary::halo_columns(&self.grid, &remote.stripe);
            send(remote, Message::StopFlag { generation, stop: false }).await?;
            send(
                remote,
                Message::BoundaryColumn {
                    generation,
                    side: Side::Left,
                    cells: left,
                },
            )
            .await?;
            send(
                remote,
                Message::BoundaryColumn {
                    generation,
                    side: Side::Right,
                    cells: right,
                },
            )
            .await?;
        }
        self.deadline = Some(Instant::now() + self.timeout);
        Ok(())
    }

    async fn serve(&mut self) -> Result<(), EngineError> {
        loop {
            if self.gate.is_halting() {
                return Ok(());
            }
            if let Some(generation) = self.gate.begin() {
                self.dispatch(generation).await?;
            }

            let in_flight = self.gate.in_flight();
            let deadline = self.deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                biased;
                request = self.requests.recv() => match request {
                    Some(request) => {
                        let reply = command::apply(&mut self.gate, &self.grid, request.command);
                        request.respond(reply);
                    }
                    None => self.gate.halt(),
                },
                reply = self.replies.recv(), if in_flight.is_some() => self.collect(reply)?,
                () = tokio::time::sleep_until(deadline), if in_flight.is_some() => {
                    return Err(EngineError::ResponseTimeout {
                        generation: in_flight.unwrap_or_default(),
                        pending: self.gate.pending(),
                        waited_ms: self.timeout.as_millis(),
                    });
                }
            }
        }
    }

    /// Files one worker reply; swaps when it was the last stripe.
    fn collect(&mut self, reply: Option<Reply>) -> Result<(), EngineError> {
        let (owner, generation, cells) = match reply {
            Some(Reply::Stripe {
                owner,
                generation,
                cells,
            }) => (owner, generation, cells),
            Some(Reply::Failed { owner, error }) => {
                return Err(EngineError::Exchange { owner, source: error });
            }
            None => {
                let owner = self.received.iter().position(|&done| !done).unwrap_or_default();
                return Err(EngineError::WorkerLost { owner });
            }
        };

        if self.gate.in_flight() != Some(generation) || self.received.get(owner) != Some(&false) {
            warn!("ignoring stale stripe from worker {owner} for generation {generation}");
            return Ok(());
        }
        let stripe = self.remotes[owner].stripe;
        let expected = stripe.width() * self.grid.height();
        if cells.len() != expected {
            return Err(EngineError::Exchange {
                owner,
                source: ExchangeError::StripeLength {
                    expected,
                    got: cells.len(),
                },
            });
        }

        self.grid.write_stripe(Buffer::Next, &stripe, &cells);
        self.received[owner] = true;
        if self.gate.complete(generation)? {
            let grid = &self.grid;
            if let Some(current) = self.gate.finish(|| grid.swap()) {
                if log_enabled!(Level::Debug) {
                    debug!(
                        "generation {current} swapped in (target {}, fingerprint {:016x})",
                        self.gate.required(),
                        grid.snapshot(current).fingerprint()
                    );
                }
                self.deadline = None;
            }
        }
        Ok(())
    }

    /// Tells every worker to stop and waits for it. Returns how many exited cleanly.
    async fn release(&mut self) -> usize {
        self.replies.close();
        let generation = self.gate.current();
        let mut released = 0;
        for Remote { stripe, outbox, task } in self.remotes.drain(..) {
            // A full inbox means the worker is still busy; dropping the sender stops it too.
            let _ = outbox.try_send(Message::StopFlag { generation, stop: true });
            drop(outbox);
            match task.await {
                Ok(()) => {
                    debug!("worker {} released", stripe.owner);
                    released += 1;
                }
                Err(err) => warn!("worker {} did not exit cleanly: {err}", stripe.owner),
            }
        }
        released
    }
}

async fn send(remote: &Remote, message: Message) -> Result<(), EngineError> {
    remote
        .outbox
        .send(message)
        .await
        .map_err(|_| EngineError::WorkerLost {
            owner: remote.stripe.owner,
        })
}

/// Worker task body. Any failure is reported once as `Reply::Failed`.
pub async fn run_remote_worker(
    owner: usize,
    mut inbox: mpsc::Receiver<Message>,
    replies: mpsc::Sender<Reply>,
    timeout: Duration,
) {
    if let Err(error) = serve_stripe(owner, &mut inbox, &replies, timeout).await {
        warn!("worker {owner} failed: {error}");
        let _ = replies.send(Reply::Failed { owner, error }).await;
    }
}

async fn serve_stripe(
    owner: usize,
    inbox: &mut mpsc::Receiver<Message>,
    replies: &mpsc::Sender<Reply>,
    timeout: Duration,
) -> Result<(), ExchangeError> {
    let (stripe, height) = match inbox.recv().await.ok_or(ExchangeError::Disconnected)? {
        Message::InitialGeometry {
            version,
            height,
            stripe,
        } => {
            if version != PROTOCOL_VERSION {
                return Err(ExchangeError::VersionMismatch {
                    expected: PROTOCOL_VERSION,
                    got: version,
                });
            }
            (stripe, height)
        }
        other => {
            return Err(ExchangeError::Unexpected {
                expected: "InitialGeometry",
                got: other.kind(),
            });
        }
    };
    let cells = match inbox.recv().await.ok_or(ExchangeError::Disconnected)? {
        Message::InitialData { cells } => cells,
        other => {
            return Err(ExchangeError::Unexpected {
                expected: "InitialData",
                got: other.kind(),
            });
        }
    };
    let mut halo = HaloStripe::new(stripe, height, cells)?;
    debug!("worker {owner} holds columns {}..={}", stripe.from, stripe.to);

    let mut completed = 0;
    loop {
        // Idle between generations for as long as the operator likes.
        let generation = match inbox.recv().await {
            None | Some(Message::StopFlag { stop: true, .. }) => return Ok(()),
            Some(Message::StopFlag { generation, .. }) => generation,
            Some(other) => {
                return Err(ExchangeError::Unexpected {
                    expected: "StopFlag",
                    got: other.kind(),
                });
            }
        };
        if generation != completed + 1 {
            return Err(ExchangeError::OutOfOrder {
                expected: completed + 1,
                got: generation,
            });
        }

        if !boundary::receive_halo(inbox, &mut halo, generation, timeout).await? {
            return Ok(());
        }
        let cells = halo.advance().to_vec();
        completed = generation;

        if replies
            .send(Reply::Stripe {
                owner,
                generation,
                cells,
            })
            .await
            .is_err()
        {
            // Coordinator is gone; nobody wants the result.
            return Ok(());
        }
    }
}
