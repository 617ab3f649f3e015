// boundary.rs - Getting halo columns to a worker before it steps
//
// Shared-memory strategies read neighbours straight out of the grid's current
// buffer; the gate guarantees nobody swaps it underneath them. The distributed
// strategy keeps only the stripe locally and receives both halo columns as
// generation-tagged messages before every step.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::ExchangeError;
use crate::grid::{Buffer, Grid};
use crate::partition::Stripe;
use crate::step::{self, Neighborhood};
use crate::wire::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Direct read of the current buffer.
pub struct SharedHalo<'a> {
    grid: &'a Grid,
}

impl<'a> SharedHalo<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        Self { grid }
    }
}

impl Neighborhood for SharedHalo<'_> {
    fn height(&self) -> usize {
        self.grid.height()
    }

    fn is_alive(&self, x: isize, y: usize) -> bool {
        self.grid.get(Buffer::Current, x, y as isize)
    }
}

/// The two columns a stripe needs from outside itself, read from the current buffer.
pub fn halo_columns(grid: &Grid, stripe: &Stripe) -> (Vec<bool>, Vec<bool>) {
    let width = grid.width();
    (
        grid.column(Buffer::Current, stripe.left_halo(width) as isize),
        grid.column(Buffer::Current, stripe.right_halo(width) as isize),
    )
}

/// A worker-owned stripe plus the halo columns received for the pending generation.
#[derive(Debug)]
pub struct HaloStripe {
    stripe: Stripe,
    height: usize,
    body: Vec<bool>,
    scratch: Vec<bool>,
    left: Option<Vec<bool>>,
    right: Option<Vec<bool>>,
    pending: u64,
}

impl HaloStripe {
    pub fn new(stripe: Stripe, height: usize, body: Vec<bool>) -> Result<Self, ExchangeError> {
        let expected = stripe.width() * height;
        if body.len() != expected {
            return Err(ExchangeError::StripeLength {
                expected,
                got: body.len(),
            });
        }
        Ok(Self {
            stripe,
            height,
            scratch: vec![false; expected],
            body,
            left: None,
            right: None,
            pending: 0,
        })
    }

    /// Column-major cells of the last completed generation.
    pub fn cells(&self) -> &[bool] {
        &self.body
    }

    /// Drops any halo left over and waits for columns tagged `generation`.
    pub fn open(&mut self, generation: u64) {
        self.pending = generation;
        self.left = None;
        self.right = None;
    }

    pub fn accept(&mut self, generation: u64, side: Side, cells: Vec<bool>) -> Result<(), ExchangeError> {
        if generation != self.pending {
            return Err(ExchangeError::GenerationMismatch {
                side,
                expected: self.pending,
                got: generation,
            });
        }
        if cells.len() != self.height {
            return Err(ExchangeError::ColumnLength {
                side,
                expected: self.height,
                got: cells.len(),
            });
        }
        match side {
            Side::Left => self.left = Some(cells),
            Side::Right => self.right = Some(cells),
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    /// Steps the stripe once, consuming the halo. Returns the new cells.
    pub fn advance(&mut self) -> &[bool] {
        debug_assert!(self.is_ready());
        let (from, height) = (self.stripe.from, self.height);
        let mut scratch = std::mem::take(&mut self.scratch);
        step::step_stripe(&*self, &self.stripe, |x, y, alive| {
            scratch[(x - from) * height + y] = alive;
        });
        self.scratch = std::mem::replace(&mut self.body, scratch);
        self.left = None;
        self.right = None;
        &self.body
    }
}

impl Neighborhood for HaloStripe {
    fn height(&self) -> usize {
        self.height
    }

    fn is_alive(&self, x: isize, y: usize) -> bool {
        let from = self.stripe.from as isize;
        let to = self.stripe.to as isize;
        let column = if x < from {
            self.left.as_deref()
        } else if x > to {
            self.right.as_deref()
        } else {
            let offset = (x - from) as usize * self.height;
            return self.body[offset + y];
        };
        column.is_some_and(|cells| cells[y])
    }
}

/// Blocks until both halo columns for `generation` have arrived.
///
/// A stop flag in the middle ends the wait with `Ok(false)`. Anything else out
/// of order, a closed channel, or `timeout` elapsing is fatal.
pub async fn receive_halo(
    inbox: &mut mpsc::Receiver<Message>,
    halo: &mut HaloStripe,
    generation: u64,
    timeout: Duration,
) -> Result<bool, ExchangeError> {
    halo.open(generation);
    let deadline = tokio::time::Instant::now() + timeout;
    while !halo.is_ready() {
        let message = tokio::time::timeout_at(deadline, inbox.recv())
            .await
            .map_err(|_| ExchangeError::Timeout { generation })?
            .ok_or(ExchangeError::Disconnected)?;
        match message {
            Message::BoundaryColumn {
                generation: tag,
                side,
                cells,
            } => halo.accept(tag, side, cells)?,
            Message::StopFlag { stop: true, .. } => return Ok(false),
            other => {
                return Err(ExchangeError::Unexpected {
                    expected: "BoundaryColumn",
                    got: other.kind(),
                });
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe(from: usize, to: usize) -> Stripe {
        Stripe { owner: 0, from, to }
    }

    #[test]
    fn shared_halo_reads_wrapped_columns() {
        let grid = Grid::with_alive(4, 3, [(3, 1)]).unwrap();
        let halo = SharedHalo::new(&grid);
        assert!(halo.is_alive(-1, 1));
        assert!(halo.is_alive(3, 1));
        assert!(!halo.is_alive(0, 1));
    }

    #[test]
    fn halo_columns_come_from_both_neighbours() {
        let grid = Grid::with_alive(6, 2, [(1, 0), (4, 1)]).unwrap();
        let (left, right) = halo_columns(&grid, &stripe(2, 3));
        assert_eq!(left, vec![true, false]);
        assert_eq!(right, vec![false, true]);
    }

    #[test]
    fn stale_generation_is_rejected() {
        let mut halo = HaloStripe::new(stripe(0, 1), 2, vec![false; 4]).unwrap();
        halo.open(5);
        let err = halo.accept(4, Side::Left, vec![false; 2]).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::GenerationMismatch {
                side: Side::Left,
                expected: 5,
                got: 4
            }
        );
        assert!(!halo.is_ready());
    }

    #[test]
    fn short_column_is_rejected() {
        let mut halo = HaloStripe::new(stripe(0, 1), 3, vec![false; 6]).unwrap();
        halo.open(1);
        assert!(matches!(
            halo.accept(1, Side::Right, vec![true]),
            Err(ExchangeError::ColumnLength { expected: 3, got: 1, .. })
        ));
    }

    #[test]
    fn wrong_body_size_is_rejected() {
        assert!(matches!(
            HaloStripe::new(stripe(0, 2), 4, vec![false; 8]),
            Err(ExchangeError::StripeLength { expected: 12, got: 8 })
        ));
    }

    #[test]
    fn halo_stripe_steps_like_the_shared_grid() {
        // Horizontal blinker across the stripe boundary at x = 2.
        let grid = Grid::with_alive(6, 5, [(1, 2), (2, 2), (3, 2)]).unwrap();
        let owned = stripe(2, 3);
        let mut halo = HaloStripe::new(owned, 5, grid.stripe_cells(Buffer::Current, &owned)).unwrap();

        halo.open(1);
        let (left, right) = halo_columns(&grid, &owned);
        halo.accept(1, Side::Left, left).unwrap();
        halo.accept(1, Side::Right, right).unwrap();
        assert!(halo.is_ready());

        let mut expected = Vec::new();
        step::step_stripe(&SharedHalo::new(&grid), &owned, |_, _, alive| expected.push(alive));
        assert_eq!(halo.advance(), expected.as_slice());
        assert!(!halo.is_ready());
    }

    #[tokio::test]
    async fn receive_halo_times_out_on_missing_column() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut halo = HaloStripe::new(stripe(0, 0), 2, vec![false; 2]).unwrap();
        tx.send(Message::BoundaryColumn {
            generation: 3,
            side: Side::Left,
            cells: vec![false; 2],
        })
        .await
        .unwrap();
        let result = receive_halo(&mut rx, &mut halo, 3, Duration::from_millis(20)).await;
        assert_eq!(result, Err(ExchangeError::Timeout { generation: 3 }));
    }

    #[tokio::test]
    async fn receive_halo_stops_on_stop_flag() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut halo = HaloStripe::new(stripe(0, 0), 2, vec![false; 2]).unwrap();
        tx.send(Message::StopFlag { generation: 1, stop: true }).await.unwrap();
        let result = receive_halo(&mut rx, &mut halo, 1, Duration::from_secs(1)).await;
        assert_eq!(result, Ok(false));
    }
}
