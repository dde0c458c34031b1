//! A Tokio-based bounded worker pool with non-blocking admission control,
//! cooperative cancellation, and fan-in result collection.
//!
//! A [`WorkerPool`] owns a bounded FIFO task queue, a one-shot stop signal,
//! and a fixed set of workers. [`WorkerPool::submit`] decides admission
//! immediately (accept, queue full, or pool stopped) and never blocks;
//! shutdown is cooperative and joins every worker before returning.
//! Completion is delivered either via per-task callbacks or via a pool-wide
//! [`ResultStream`] that is closed exactly once, after all workers have
//! exited.

mod collector;
mod error;
mod pool;
mod queue;
mod signal;
mod task;
mod worker;

pub use collector::ResultStream;
pub use error::{PoolError, TaskError};
pub use pool::{PoolState, ShutdownMode, WorkerPool};
pub use task::{Task, TaskCallback, TaskFn, TaskResult};
