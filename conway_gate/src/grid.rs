// grid.rs - Double-buffered toroidal grid for Conway's Game of Life

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::FieldError;
use crate::partition::Stripe;

/// Which of the two buffers an access targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buffer {
    /// Latest completed generation.
    Current,
    /// Write target of the generation in flight.
    Next,
}

/// Cells are stored column-major (`x * height + y`) so that a stripe of
/// columns is one contiguous run.
///
/// Cell storage is atomic so that workers can read the current buffer while
/// writing disjoint stripes of the next one through a shared reference. The
/// generation gate supplies the ordering; cell accesses themselves are relaxed.
pub struct Grid {
    width: usize,
    height: usize,
    buffers: [Box<[AtomicBool]>; 2],
    current: AtomicUsize,
}

impl Grid {
    /// Zero-filled grid.
    pub fn new(width: usize, height: usize) -> Result<Self, FieldError> {
        if width == 0 || height == 0 {
            return Err(FieldError::EmptyGrid { width, height });
        }
        let blank = || -> Box<[AtomicBool]> {
            (0..width * height).map(|_| AtomicBool::new(false)).collect()
        };
        Ok(Self {
            width,
            height,
            buffers: [blank(), blank()],
            current: AtomicUsize::new(0),
        })
    }

    /// Grid whose current buffer has exactly `alive` set. Coordinates wrap.
    pub fn with_alive<I>(width: usize, height: usize, alive: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let grid = Self::new(width, height)?;
        for (x, y) in alive {
            grid.set(Buffer::Current, x as isize, y as isize, true);
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn slot(&self, buffer: Buffer) -> usize {
        let current = self.current.load(Ordering::Acquire);
        match buffer {
            Buffer::Current => current,
            Buffer::Next => current ^ 1,
        }
    }

    fn index(&self, x: isize, y: isize) -> usize {
        let x = x.rem_euclid(self.width as isize) as usize;
        let y = y.rem_euclid(self.height as isize) as usize;
        x * self.height + y
    }

    /// Toroidal cell reference: both coordinates are taken modulo the grid size.
    pub fn cell(&self, buffer: Buffer, x: isize, y: isize) -> &AtomicBool {
        &self.buffers[self.slot(buffer)][self.index(x, y)]
    }

    pub fn get(&self, buffer: Buffer, x: isize, y: isize) -> bool {
        self.cell(buffer, x, y).load(Ordering::Relaxed)
    }

    pub fn set(&self, buffer: Buffer, x: isize, y: isize, alive: bool) {
        self.cell(buffer, x, y).store(alive, Ordering::Relaxed);
    }

    /// Exchanges the roles of the two buffers.
    ///
    /// Only the generation gate calls this, under its lock, once every stripe
    /// of the next buffer has been written.
    pub fn swap(&self) {
        self.current.fetch_xor(1, Ordering::AcqRel);
    }

    /// One full column, top to bottom. `x` wraps.
    pub fn column(&self, buffer: Buffer, x: isize) -> Vec<bool> {
        (0..self.height as isize).map(|y| self.get(buffer, x, y)).collect()
    }

    /// The stripe's columns, column-major.
    pub fn stripe_cells(&self, buffer: Buffer, stripe: &Stripe) -> Vec<bool> {
        let cells = &self.buffers[self.slot(buffer)];
        let start = stripe.from * self.height;
        let end = (stripe.to + 1) * self.height;
        cells[start..end].iter().map(|cell| cell.load(Ordering::Relaxed)).collect()
    }

    /// Overwrites the stripe's columns; `values` is column-major and must
    /// cover the stripe exactly.
    pub fn write_stripe(&self, buffer: Buffer, stripe: &Stripe, values: &[bool]) {
        let cells = &self.buffers[self.slot(buffer)];
        let start = stripe.from * self.height;
        let end = (stripe.to + 1) * self.height;
        debug_assert_eq!(values.len(), end - start);
        for (cell, &alive) in cells[start..end].iter().zip(values) {
            cell.store(alive, Ordering::Relaxed);
        }
    }

    /// Row-major copy of the current buffer, labelled with `generation`.
    pub fn snapshot(&self, generation: u64) -> Snapshot {
        let mut cells = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                cells.push(self.get(Buffer::Current, x, y));
            }
        }
        Snapshot {
            generation,
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("current", &self.current.load(Ordering::Relaxed))
            .finish()
    }
}

/// A consistent copy of one completed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub generation: u64,
    pub width: usize,
    pub height: usize,
    /// Row-major.
    pub cells: Vec<bool>,
}

impl Snapshot {
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }

    /// Live cells as `(x, y)`, sorted.
    pub fn alive_cells(&self) -> Vec<(usize, usize)> {
        let mut alive: Vec<_> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_alive(x, y))
            .collect();
        alive.sort_unstable();
        alive
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&alive| alive).count()
    }

    /// Hash of the cell pattern only (generation excluded).
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.cells.hash(&mut hasher);
        hasher.finish()
    }

    /// One string per row, alive `O`, dead `_`.
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.cells
            .chunks(self.width)
            .map(|row| row.iter().map(|&alive| if alive { 'O' } else { '_' }).collect())
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(&row)?;
        }
        Ok(())
    }
}
