// strategy/mod.rs - Three interchangeable ways to drive the workers
//
// All of them accept the same commands and produce the same grids for the
// same sequence of advances, whatever the worker count.

pub mod data_parallel;
pub mod distributed;
pub mod pool;
