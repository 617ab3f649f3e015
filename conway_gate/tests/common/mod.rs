// common/mod.rs - Shared helpers for the engine integration tests

#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use conway_gate::{CommandChannel, Engine, EngineConfig, Grid, Snapshot, Strategy, launch};

pub const STRATEGIES: [Strategy; 3] = [Strategy::DataParallel, Strategy::Pool, Strategy::Distributed];

pub fn config(strategy: Strategy, workers: usize) -> EngineConfig {
    EngineConfig {
        strategy,
        workers,
        poll_interval_ms: 1,
        exchange_timeout_ms: 5000,
    }
}

pub fn start(grid: Grid, strategy: Strategy, workers: usize) -> Engine {
    launch(grid, &config(strategy, workers)).expect("engine should start")
}

/// Polls snapshots until `generation` is current.
pub fn settle(commands: &CommandChannel, generation: u64) -> Snapshot {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let snapshot = commands.snapshot().expect("snapshot");
        if snapshot.generation == generation {
            return snapshot;
        }
        assert!(
            snapshot.generation < generation,
            "overshot: at {} waiting for {generation}",
            snapshot.generation
        );
        assert!(Instant::now() < deadline, "stuck at generation {}", snapshot.generation);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Straightforward single-threaded reference on a row-major torus.
pub struct Reference {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<bool>,
}

impl Reference {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            width: snapshot.width,
            height: snapshot.height,
            cells: snapshot.cells.clone(),
        }
    }

    pub fn step(&mut self) {
        let (w, h) = (self.width, self.height);
        let mut next = vec![false; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut count = 0;
                // Offsets are shifted by one full lap so that a one-wide torus
                // still sees its own column on both sides.
                for dy in [h - 1, h, h + 1] {
                    for dx in [w - 1, w, w + 1] {
                        if (dx, dy) != (w, h) && self.cells[((y + dy) % h) * w + (x + dx) % w] {
                            count += 1;
                        }
                    }
                }
                let alive = self.cells[y * w + x];
                next[y * w + x] = count == 3 || (count == 2 && alive);
            }
        }
        self.cells = next;
    }

    pub fn run(&mut self, generations: u64) {
        for _ in 0..generations {
            self.step();
        }
    }
}
