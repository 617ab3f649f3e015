// patterns.rs - Named seed patterns and a reproducible random fill

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::FieldError;
use crate::grid::{Buffer, Grid};

/// Live cells as `(x, y)` offsets from the pattern's top-left corner.
pub struct Pattern {
    pub name: &'static str,
    pub cells: &'static [(usize, usize)],
}

impl Pattern {
    /// Width and height of the pattern's bounding box.
    pub fn extent(&self) -> (usize, usize) {
        self.cells
            .iter()
            .fold((0, 0), |(w, h), &(x, y)| (w.max(x + 1), h.max(y + 1)))
    }
}

pub const BLINKER: Pattern = Pattern {
    name: "Blinker",
    cells: &[(1, 0), (1, 1), (1, 2)],
};

pub const GLIDER: Pattern = Pattern {
    name: "Glider",
    cells: &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)],
};

pub const PATTERNS: &[Pattern] = &[
    BLINKER,
    GLIDER,
    Pattern {
        name: "Toad",
        cells: &[(1, 0), (2, 0), (3, 0), (0, 1), (1, 1), (2, 1)],
    },
    Pattern {
        name: "Beacon",
        cells: &[(0, 0), (1, 0), (0, 1), (1, 1), (2, 2), (3, 2), (2, 3), (3, 3)],
    },
    Pattern {
        name: "R-pentomino",
        cells: &[(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)],
    },
];

/// Case-insensitive lookup by name.
pub fn find(name: &str) -> Result<&'static Pattern, FieldError> {
    PATTERNS
        .iter()
        .find(|pattern| pattern.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| FieldError::UnknownPattern(name.to_string()))
}

/// Sets the pattern's cells in the current buffer, shifted by `origin`. Wraps.
pub fn place(grid: &Grid, pattern: &Pattern, origin: (usize, usize)) {
    for &(x, y) in pattern.cells {
        grid.set(
            Buffer::Current,
            (origin.0 + x) as isize,
            (origin.1 + y) as isize,
            true,
        );
    }
}

/// A `width` x `height` grid holding only `pattern`, roughly centred.
pub fn seeded(pattern: &Pattern, width: usize, height: usize) -> Result<Grid, FieldError> {
    let grid = Grid::new(width, height)?;
    let (w, h) = pattern.extent();
    place(&grid, pattern, (width.saturating_sub(w) / 2, height.saturating_sub(h) / 2));
    Ok(grid)
}

/// Roughly a third of the cells alive, fully determined by `seed`.
pub fn random(width: usize, height: usize, seed: u64) -> Result<Grid, FieldError> {
    let grid = Grid::new(width, height)?;

    // Simple pseudo-random generator
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let mut state = hasher.finish();

    for x in 0..width as isize {
        for y in 0..height as isize {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            grid.set(Buffer::Current, x, y, (state >> 33) % 3 == 0);
        }
    }
    Ok(grid)
}
