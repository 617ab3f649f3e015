// partition.rs - Column stripes, one per worker

use std::ops::RangeInclusive;

use crate::error::PartitionError;

/// An inclusive range of grid columns owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stripe {
    pub owner: usize,
    pub from: usize,
    pub to: usize,
}

impl Stripe {
    pub fn width(&self) -> usize {
        self.to - self.from + 1
    }

    pub fn columns(&self) -> RangeInclusive<usize> {
        self.from..=self.to
    }

    pub fn contains(&self, x: usize) -> bool {
        self.columns().contains(&x)
    }

    /// Column just left of the stripe, wrapped.
    pub fn left_halo(&self, grid_width: usize) -> usize {
        (self.from + grid_width - 1) % grid_width
    }

    /// Column just right of the stripe, wrapped.
    pub fn right_halo(&self, grid_width: usize) -> usize {
        (self.to + 1) % grid_width
    }
}

/// Splits `0..width` into `workers` contiguous stripes.
///
/// Every stripe but the last is `ceil(width / workers)` columns wide and the
/// last takes what remains. When that would leave trailing stripes empty
/// (e.g. 5 columns over 4 workers), starts are pulled back just enough that
/// each stripe keeps at least one column. The result depends only on
/// `(width, workers)`.
pub fn partition(width: usize, workers: usize) -> Result<Vec<Stripe>, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if workers > width {
        return Err(PartitionError::TooManyWorkers { workers, width });
    }

    let stripe_width = width.div_ceil(workers);
    let start = |i: usize| (i * stripe_width).min(width - (workers - i));

    Ok((0..workers)
        .map(|owner| Stripe {
            owner,
            from: start(owner),
            to: if owner + 1 == workers { width - 1 } else { start(owner + 1) - 1 },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(width: usize, stripes: &[Stripe]) {
        let mut owner = vec![None; width];
        for stripe in stripes {
            assert!(stripe.from <= stripe.to, "empty stripe {stripe:?}");
            for x in stripe.columns() {
                assert_eq!(owner[x], None, "column {x} assigned twice");
                owner[x] = Some(stripe.owner);
            }
        }
        assert!(owner.iter().all(Option::is_some), "gap in {stripes:?}");
    }

    #[test]
    fn stripes_cover_every_width_exactly() {
        for width in 1..=40 {
            for workers in 1..=width {
                let stripes = partition(width, workers).unwrap();
                assert_eq!(stripes.len(), workers);
                assert_exact_cover(width, &stripes);
                for (i, stripe) in stripes.iter().enumerate() {
                    assert_eq!(stripe.owner, i);
                }
            }
        }
    }

    #[test]
    fn last_stripe_absorbs_remainder() {
        let widths: Vec<_> = partition(10, 4).unwrap().iter().map(Stripe::width).collect();
        assert_eq!(widths, vec![3, 3, 3, 1]);

        let widths: Vec<_> = partition(12, 4).unwrap().iter().map(Stripe::width).collect();
        assert_eq!(widths, vec![3, 3, 3, 3]);
    }

    #[test]
    fn trailing_stripes_are_never_starved() {
        let widths: Vec<_> = partition(5, 4).unwrap().iter().map(Stripe::width).collect();
        assert_eq!(widths, vec![2, 1, 1, 1]);
    }

    #[test]
    fn assignment_is_stable() {
        assert_eq!(partition(17, 5).unwrap(), partition(17, 5).unwrap());
    }

    #[test]
    fn invalid_worker_counts_are_rejected() {
        assert_eq!(partition(8, 0), Err(PartitionError::NoWorkers));
        assert_eq!(
            partition(3, 4),
            Err(PartitionError::TooManyWorkers { workers: 4, width: 3 })
        );
    }

    #[test]
    fn halos_wrap_around_the_torus() {
        let stripes = partition(9, 3).unwrap();
        assert_eq!(stripes[0].left_halo(9), 8);
        assert_eq!(stripes[0].right_halo(9), 3);
        assert_eq!(stripes[2].right_halo(9), 0);

        let whole = partition(4, 1).unwrap()[0];
        assert_eq!(whole.left_halo(4), 3);
        assert_eq!(whole.right_halo(4), 0);
    }
}
