// wire.rs - Messages between the distributed coordinator and its stripe workers

use crate::boundary::Side;
use crate::error::ExchangeError;
use crate::partition::Stripe;

/// Bumped whenever a message changes shape.
pub const PROTOCOL_VERSION: u16 = 1;

/// Coordinator to worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// First message a worker sees: its stripe and the grid height.
    InitialGeometry {
        version: u16,
        height: usize,
        stripe: Stripe,
    },
    /// The stripe's generation-0 cells, column-major.
    InitialData { cells: Vec<bool> },
    /// Opens generation `generation` (`stop == false`) or tells the worker to exit.
    StopFlag { generation: u64, stop: bool },
    /// One halo column as it stood at the end of `generation - 1`.
    BoundaryColumn {
        generation: u64,
        side: Side,
        cells: Vec<bool>,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::InitialGeometry { .. } => "InitialGeometry",
            Message::InitialData { .. } => "InitialData",
            Message::StopFlag { .. } => "StopFlag",
            Message::BoundaryColumn { .. } => "BoundaryColumn",
        }
    }
}

/// Worker to coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The stripe's cells after computing `generation`, column-major.
    Stripe {
        owner: usize,
        generation: u64,
        cells: Vec<bool>,
    },
    /// The worker gave up; it sends nothing after this.
    Failed { owner: usize, error: ExchangeError },
}
