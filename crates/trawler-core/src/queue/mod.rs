//! Task queue: priority ordering with FIFO ties, blocking pop, and
//! outstanding-work accounting.

mod priority;

pub use priority::TaskQueue;
