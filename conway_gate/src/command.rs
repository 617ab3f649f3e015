// command.rs - Operator commands and the channel that carries them to the coordinator

use std::sync::Arc;
use std::thread;

use log::{info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::error::{EngineError, GateError};
use crate::gate::{GateState, GenerationGate};
use crate::grid::{Grid, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Snapshot,
    /// Raise the target by this many generations; must be positive.
    Advance(i64),
    StopAfterCurrent,
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Snapshot(Snapshot),
    /// Target after an `Advance` or `StopAfterCurrent`.
    Target(u64),
    /// The halt was recorded; teardown is under way.
    Halting,
}

/// Applies `command` to the counters. Snapshots read `grid`, so the caller
/// must make sure no swap can run concurrently.
pub(crate) fn apply(state: &mut GateState, grid: &Grid, command: Command) -> Result<Reply, GateError> {
    let reply = match command {
        Command::Snapshot => Ok(Reply::Snapshot(grid.snapshot(state.current()))),
        Command::Advance(n) => state.advance(n).map(Reply::Target),
        Command::StopAfterCurrent => state.stop_after_current().map(Reply::Target),
        Command::Halt => {
            state.halt();
            info!("halt requested at generation {}", state.current());
            Ok(Reply::Halting)
        }
    };
    if let Err(err) = &reply {
        warn!("{command:?} rejected: {err}");
    }
    reply
}

/// A command on its way to the coordinator, with the slot for its answer.
#[derive(Debug)]
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Result<Reply, GateError>>,
}

impl Request {
    pub fn respond(self, reply: Result<Reply, GateError>) {
        // The operator may have given up waiting; nothing to do then.
        let _ = self.reply.send(reply);
    }
}

/// Operator side of the command channel. Cheap to clone.
///
/// Every call returns once the coordinator has recorded the command; none of
/// them waits for generations to be computed.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    requests: mpsc::UnboundedSender<Request>,
}

impl CommandChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Request>) {
        let (requests, inbox) = mpsc::unbounded_channel();
        (Self { requests }, inbox)
    }

    /// Sends `command` and blocks for the reply. Must not be called from
    /// inside an async runtime.
    pub fn send(&self, command: Command) -> Result<Reply, EngineError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Request { command, reply })
            .map_err(|_| EngineError::Disconnected)?;
        let reply = answer.blocking_recv().map_err(|_| EngineError::Disconnected)?;
        Ok(reply?)
    }

    /// Async counterpart of [`send`](Self::send).
    pub async fn send_async(&self, command: Command) -> Result<Reply, EngineError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Request { command, reply })
            .map_err(|_| EngineError::Disconnected)?;
        let reply = answer.await.map_err(|_| EngineError::Disconnected)?;
        Ok(reply?)
    }

    pub fn snapshot(&self) -> Result<Snapshot, EngineError> {
        match self.send(Command::Snapshot)? {
            Reply::Snapshot(snapshot) => Ok(snapshot),
            _ => Err(EngineError::Disconnected),
        }
    }

    /// Returns the new target.
    pub fn advance(&self, n: i64) -> Result<u64, EngineError> {
        self.target(Command::Advance(n))
    }

    /// Returns the new target.
    pub fn stop(&self) -> Result<u64, EngineError> {
        self.target(Command::StopAfterCurrent)
    }

    pub fn halt(&self) -> Result<(), EngineError> {
        self.send(Command::Halt).map(|_| ())
    }

    /// Queues a halt without waiting for the acknowledgement, so it is safe to
    /// call from inside an async runtime.
    pub fn request_halt(&self) -> Result<(), EngineError> {
        let (reply, _answer) = oneshot::channel();
        self.requests
            .send(Request {
                command: Command::Halt,
                reply,
            })
            .map_err(|_| EngineError::Disconnected)
    }

    fn target(&self, command: Command) -> Result<u64, EngineError> {
        match self.send(command)? {
            Reply::Target(required) => Ok(required),
            _ => Err(EngineError::Disconnected),
        }
    }
}

struct HaltOnExit<'a>(&'a GenerationGate);

impl Drop for HaltOnExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("command service panicked, halting");
        }
        self.0.halt();
    }
}

/// Services commands for the shared-memory strategies on a thread of its own,
/// so they are handled while a generation is being computed. Exits after a
/// halt, or halts the gate when every sender is gone.
pub(crate) fn spawn_service(
    mut inbox: mpsc::UnboundedReceiver<Request>,
    gate: Arc<GenerationGate>,
    grid: Arc<Grid>,
) -> Result<thread::JoinHandle<()>, EngineError> {
    thread::Builder::new()
        .name("life-commands".into())
        .spawn(move || {
            // Halts on every way out, unwinding included, so nobody waits on a dead service.
            let _halt = HaltOnExit(&gate);
            while let Some(request) = inbox.blocking_recv() {
                let halting = request.command == Command::Halt;
                let reply = gate.apply(&grid, request.command);
                request.respond(reply);
                if halting {
                    break;
                }
            }
        })
        .map_err(|source| EngineError::Spawn {
            what: "command service",
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_the_current_generation() {
        let grid = Grid::with_alive(3, 3, [(1, 1)]).unwrap();
        let mut state = GateState::new(1);
        match apply(&mut state, &grid, Command::Snapshot).unwrap() {
            Reply::Snapshot(snapshot) => {
                assert_eq!(snapshot.generation, 0);
                assert_eq!(snapshot.alive_cells(), vec![(1, 1)]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_advance_leaves_state_untouched() {
        let grid = Grid::new(3, 3).unwrap();
        let mut state = GateState::new(1);
        let before = state.clone();
        assert_eq!(
            apply(&mut state, &grid, Command::Advance(0)),
            Err(GateError::InvalidAdvance(0))
        );
        assert_eq!(state, before);
    }

    #[test]
    fn channel_round_trip_through_service() {
        let grid = Arc::new(Grid::new(3, 3).unwrap());
        let gate = Arc::new(GenerationGate::new(1));
        let (channel, inbox) = CommandChannel::new();
        let service = spawn_service(inbox, Arc::clone(&gate), grid).unwrap();

        assert_eq!(channel.advance(4).unwrap(), 4);
        assert_eq!(channel.stop().unwrap(), 0);
        assert!(matches!(
            channel.advance(-1),
            Err(EngineError::Gate(GateError::InvalidAdvance(-1)))
        ));
        assert_eq!(channel.snapshot().unwrap().generation, 0);
        channel.halt().unwrap();
        service.join().unwrap();

        assert!(gate.state().is_halting());
        assert!(matches!(channel.advance(1), Err(EngineError::Disconnected)));
    }

    #[test]
    fn dropping_every_sender_halts_the_gate() {
        let grid = Arc::new(Grid::new(2, 2).unwrap());
        let gate = Arc::new(GenerationGate::new(1));
        let (channel, inbox) = CommandChannel::new();
        let service = spawn_service(inbox, Arc::clone(&gate), grid).unwrap();
        drop(channel);
        service.join().unwrap();
        assert!(gate.cancel().is_raised());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn async_sender_is_served_too() {
        let grid = Arc::new(Grid::with_alive(4, 4, [(0, 0), (3, 3)]).unwrap());
        let gate = Arc::new(GenerationGate::new(2));
        let (channel, inbox) = CommandChannel::new();
        let service = spawn_service(inbox, Arc::clone(&gate), grid).unwrap();

        assert_eq!(channel.send_async(Command::Advance(2)).await.unwrap(), Reply::Target(2));
        match channel.send_async(Command::Snapshot).await.unwrap() {
            Reply::Snapshot(snapshot) => assert_eq!(snapshot.alive_cells(), vec![(0, 0), (3, 3)]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(channel.send_async(Command::Halt).await.unwrap(), Reply::Halting);
        tokio::task::spawn_blocking(move || service.join().unwrap()).await.unwrap();
    }
}
