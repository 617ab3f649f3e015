// error.rs - Error types for the generation-gated engine

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::boundary::Side;

/// Rejected worker counts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("{workers} workers cannot share a grid {width} columns wide")]
    TooManyWorkers { workers: usize, width: usize },
}

/// Commands the gate refused. Always recoverable: the simulation state is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("advance needs a positive generation count, got {0}")]
    InvalidAdvance(i64),
    #[error("advancing {n} more generations past {required} overflows the target")]
    TargetOverflow { required: u64, n: i64 },
    #[error("simulation is halting")]
    Halted,
    #[error("worker reported generation {reported} while generation {expected} is in flight")]
    UnexpectedCompletion { reported: u64, expected: u64 },
}

/// Boundary transfer failures in the distributed strategy. Fatal to the generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error("timed out waiting for boundary columns of generation {generation}")]
    Timeout { generation: u64 },
    #[error("{side:?} boundary column tagged with generation {got}, expected {expected}")]
    GenerationMismatch { side: Side, expected: u64, got: u64 },
    #[error("{side:?} boundary column has {got} cells, expected {expected}")]
    ColumnLength { side: Side, expected: usize, got: usize },
    #[error("stripe data has {got} cells, expected {expected}")]
    StripeLength { expected: usize, got: usize },
    #[error("peer speaks protocol version {got}, expected {expected}")]
    VersionMismatch { expected: u16, got: u16 },
    #[error("unexpected {got} message while waiting for {expected}")]
    Unexpected { expected: &'static str, got: &'static str },
    #[error("asked to compute generation {got}, expected {expected}")]
    OutOfOrder { expected: u64, got: u64 },
    #[error("peer disconnected")]
    Disconnected,
}

/// Startup failures while building the initial grid.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("cannot read field file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("ill-formed field description: {0}")]
    Malformed(String),
    #[error("grid dimensions must be positive, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },
    #[error("cell ({x}, {y}) lies outside a {width}x{height} grid")]
    OutOfRange { x: i64, y: i64, width: usize, height: usize },
    #[error("unknown pattern `{0}`")]
    UnknownPattern(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("unknown strategy `{0}` (expected data-parallel, pool or distributed)")]
    UnknownStrategy(String),
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Everything that can stop an engine from starting or finishing cleanly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("worker {owner} failed: {source}")]
    Exchange {
        owner: usize,
        #[source]
        source: ExchangeError,
    },
    #[error("worker {owner} disappeared")]
    WorkerLost { owner: usize },
    #[error("no stripe results for generation {generation} after {waited_ms} ms ({pending} outstanding)")]
    ResponseTimeout {
        generation: u64,
        pending: usize,
        waited_ms: u128,
    },
    #[error("coordinator is no longer accepting commands")]
    Disconnected,
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to build stripe thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("{0} panicked")]
    Panicked(&'static str),
}
