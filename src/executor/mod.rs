/*!
 * Executor Module
 * Worker pool and the queue disciplines it drains
 */

pub mod pool;
pub mod queue;

pub use pool::{TaskHooks, WorkerPool};
pub use queue::{make_queue, DelayQueue, FifoQueue, LifoQueue, Poll, TaskQueue};
