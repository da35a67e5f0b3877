//! Idle-worker queues.
//!
//! A pool parks every worker that finished a job in a [`WorkerQueue`] until
//! the next submission picks it up or the purge scavenger evicts it. Two
//! policies exist:
//!
//! - [`WorkerStack`]: LIFO over a growable vector, the most recently used
//!   worker is reused first
//! - [`WorkerLoopQueue`]: FIFO over a fixed ring buffer, selected by
//!   pre-allocation
//!
//! Both keep their items ordered by last-use time, oldest first, which lets
//! [`WorkerQueue::refresh`] cut the expired prefix without scanning the rest.
//! Queues are not synchronised; the pool guards them with its lock.

mod loop_queue;
mod stack;

use std::time::{Duration, Instant};

use colony_api::PoolError;

pub use loop_queue::WorkerLoopQueue;
pub use stack::WorkerStack;

/// An idle worker as seen by a queue.
pub trait IdleWorker {
    /// When the worker was last returned to the pool.
    fn last_used(&self) -> Instant;
}

/// Container of idle workers.
pub trait WorkerQueue<W>: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parks `worker`. Fails with `QueueIsFull` when a bounded queue has no
    /// slot and with `QueueIsReleased` after [`WorkerQueue::reset`].
    fn insert(&mut self, worker: W) -> Result<(), PoolError>;

    /// Takes the next worker according to the queue's policy.
    fn detach(&mut self) -> Option<W>;

    /// Removes and returns every worker idle for at least `expiry` at `now`.
    fn refresh(&mut self, now: Instant, expiry: Duration) -> Vec<W>;

    /// Removes every worker and refuses further inserts.
    fn reset(&mut self) -> Vec<W>;

    /// Raises the capacity of a bounded queue. Unbounded queues ignore it.
    fn grow(&mut self, _capacity: usize) {}
}

/// Idle-worker policy of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Stack,
    LoopQueue,
}

/// Builds the queue for `kind`. `size` pre-sizes the stack and bounds the
/// loop queue.
pub fn new_worker_queue<W>(kind: QueueKind, size: usize) -> Box<dyn WorkerQueue<W>>
where
    W: IdleWorker + Send + 'static,
{
    match kind {
        QueueKind::Stack => Box::new(WorkerStack::with_capacity(size)),
        QueueKind::LoopQueue => Box::new(WorkerLoopQueue::new(size)),
    }
}

/// Instant at or before which a worker counts as expired.
pub(crate) fn expiry_threshold(now: Instant, expiry: Duration) -> Option<Instant> {
    now.checked_sub(expiry)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Instant;

    use super::IdleWorker;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dummy {
        pub id: u32,
        pub at: Instant,
    }

    impl IdleWorker for Dummy {
        fn last_used(&self) -> Instant {
            self.at
        }
    }
}
