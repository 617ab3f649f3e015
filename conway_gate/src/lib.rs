// lib.rs - Generation-gated parallel Game of Life on a toroidal grid
//
// The grid is split into column stripes, one per worker. Workers advance in
// lock-step behind a generation gate while operator commands (snapshot,
// advance, stop, halt) arrive asynchronously. Three coordinator strategies
// share the same contract: a fork-join data-parallel loop, a persistent
// worker pool with a barrier, and message-passing workers that own only
// their stripe.

pub mod boundary;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod gate;
pub mod grid;
pub mod partition;
pub mod patterns;
pub mod step;
pub mod strategy;
pub mod wire;

pub use command::{Command, CommandChannel, Reply};
pub use config::{EngineConfig, Strategy};
pub use engine::{Engine, Shutdown, launch};
pub use error::{ConfigError, EngineError, ExchangeError, FieldError, GateError, PartitionError};
pub use grid::{Buffer, Grid, Snapshot};
pub use partition::{Stripe, partition};
