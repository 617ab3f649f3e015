// step.rs - The Life transition for one stripe

use crate::partition::Stripe;

/// Read access to a stripe's cells plus one halo column on each side.
///
/// `x` is a global column index in `stripe.from - 1 ..= stripe.to + 1`
/// (unwrapped, so `-1` may appear); `y` is always within `0..height`.
pub trait Neighborhood {
    fn height(&self) -> usize;
    fn is_alive(&self, x: isize, y: usize) -> bool;
}

/// Alive iff exactly 3 neighbours are alive, or 2 and the cell already is.
pub fn next_state(alive: bool, neighbors: u8) -> bool {
    match (alive, neighbors) {
        (true, 2) | (true, 3) => true, // Survival
        (false, 3) => true,            // Birth
        _ => false,                    // Death or stays dead
    }
}

/// Live cells among the 8 toroidal neighbours of `(x, y)`.
pub fn live_neighbors<N: Neighborhood + ?Sized>(view: &N, x: isize, y: usize) -> u8 {
    let height = view.height();
    let rows = [(y + height - 1) % height, y, (y + 1) % height];
    let mut count = 0;
    for nx in [x - 1, x, x + 1] {
        for (dy, &ny) in rows.iter().enumerate() {
            if nx == x && dy == 1 {
                continue;
            }
            if view.is_alive(nx, ny) {
                count += 1;
            }
        }
    }
    count
}

/// Next state of column `x`, reported top to bottom through `emit(y, alive)`.
pub fn step_column<N, F>(view: &N, x: usize, mut emit: F)
where
    N: Neighborhood + ?Sized,
    F: FnMut(usize, bool),
{
    let x = x as isize;
    for y in 0..view.height() {
        let alive = view.is_alive(x, y);
        emit(y, next_state(alive, live_neighbors(view, x, y)));
    }
}

/// Next state of the whole stripe through `emit(x, y, alive)`, column by column.
pub fn step_stripe<N, F>(view: &N, stripe: &Stripe, mut emit: F)
where
    N: Neighborhood + ?Sized,
    F: FnMut(usize, usize, bool),
{
    for x in stripe.columns() {
        step_column(view, x, |y, alive| emit(x, y, alive));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plain toroidal board for checking the rule in isolation.
    struct Board {
        width: usize,
        height: usize,
        alive: Vec<(usize, usize)>,
    }

    impl Neighborhood for Board {
        fn height(&self) -> usize {
            self.height
        }

        fn is_alive(&self, x: isize, y: usize) -> bool {
            let x = x.rem_euclid(self.width as isize) as usize;
            self.alive.contains(&(x, y))
        }
    }

    #[test]
    fn transition_rule() {
        for neighbors in 0..=8 {
            assert_eq!(next_state(false, neighbors), neighbors == 3);
            assert_eq!(next_state(true, neighbors), neighbors == 2 || neighbors == 3);
        }
    }

    #[test]
    fn neighbors_wrap_across_every_edge() {
        let board = Board {
            width: 4,
            height: 4,
            alive: vec![(3, 3), (0, 3), (3, 0)],
        };
        assert_eq!(live_neighbors(&board, 0, 0), 3);
        assert_eq!(live_neighbors(&board, 3, 3), 2);
    }

    #[test]
    fn cell_does_not_count_itself() {
        let board = Board {
            width: 3,
            height: 3,
            alive: vec![(1, 1)],
        };
        assert_eq!(live_neighbors(&board, 1, 1), 0);
    }

    #[test]
    fn blinker_flips_within_a_stripe() {
        let board = Board {
            width: 5,
            height: 5,
            alive: vec![(2, 1), (2, 2), (2, 3)],
        };
        let stripe = Stripe { owner: 0, from: 1, to: 3 };
        let mut born = Vec::new();
        step_stripe(&board, &stripe, |x, y, alive| {
            if alive {
                born.push((x, y));
            }
        });
        assert_eq!(born, vec![(1, 2), (2, 2), (3, 2)]);
    }
}
