use std::time::{Duration, Instant};

use colony_api::PoolError;
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer};

use super::{IdleWorker, WorkerQueue, expiry_threshold};

/// Fixed-capacity FIFO queue of idle workers backed by a ring buffer.
///
/// Inserts land at the tail and detaches take from the head, so the head
/// always holds the worker idle for longest.
pub struct WorkerLoopQueue<W> {
    items: HeapRb<W>,
    released: bool,
}

impl<W> WorkerLoopQueue<W> {
    /// A zero `capacity` is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: HeapRb::new(capacity.max(1)),
            released: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity().get()
    }

    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }
}

impl<W: IdleWorker + Send> WorkerQueue<W> for WorkerLoopQueue<W> {
    fn len(&self) -> usize {
        self.items.occupied_len()
    }

    fn insert(&mut self, worker: W) -> Result<(), PoolError> {
        if self.released {
            return Err(PoolError::QueueIsReleased);
        }
        self.items.try_push(worker).map_err(|_| PoolError::QueueIsFull)
    }

    fn detach(&mut self) -> Option<W> {
        self.items.try_pop()
    }

    fn refresh(&mut self, now: Instant, expiry: Duration) -> Vec<W> {
        let Some(threshold) = expiry_threshold(now, expiry) else {
            return Vec::new();
        };
        let expired = self
            .items
            .iter()
            .take_while(|w| w.last_used() <= threshold)
            .count();

        let mut stale = Vec::with_capacity(expired);
        for _ in 0..expired {
            match self.items.try_pop() {
                Some(w) => stale.push(w),
                None => break,
            }
        }
        stale
    }

    fn reset(&mut self) -> Vec<W> {
        self.released = true;
        let mut drained = Vec::with_capacity(self.len());
        while let Some(w) = self.items.try_pop() {
            drained.push(w);
        }
        drained
    }

    fn grow(&mut self, capacity: usize) {
        if capacity <= self.capacity() {
            return;
        }
        let mut items = HeapRb::new(capacity);
        while let Some(w) = self.items.try_pop() {
            // fits: the new buffer is larger than the old one
            let _ = items.try_push(w);
        }
        self.items = items;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Dummy;
    use super::*;

    #[test]
    fn test_fifo_and_full() {
        let now = Instant::now();
        let mut queue = WorkerLoopQueue::new(2);

        queue.insert(Dummy { id: 0, at: now }).unwrap();
        queue.insert(Dummy { id: 1, at: now }).unwrap();
        assert!(queue.is_full());
        assert_eq!(queue.insert(Dummy { id: 2, at: now }), Err(PoolError::QueueIsFull));

        assert_eq!(queue.detach().map(|w| w.id), Some(0));
        queue.insert(Dummy { id: 3, at: now }).unwrap();
        assert_eq!(queue.detach().map(|w| w.id), Some(1));
        assert_eq!(queue.detach().map(|w| w.id), Some(3));
        assert!(queue.detach().is_none());
    }

    #[test]
    fn test_refresh_wraps_around() {
        let base = Instant::now();
        let mut queue = WorkerLoopQueue::new(3);

        // advance head and tail past the end of the buffer
        for id in 0..2u32 {
            queue.insert(Dummy { id, at: base }).unwrap();
            queue.detach();
        }
        for id in 10..13u32 {
            let at = base + Duration::from_secs(u64::from(id - 10));
            queue.insert(Dummy { id, at }).unwrap();
        }

        let expired = queue.refresh(base + Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(expired.iter().map(|w| w.id).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.detach().map(|w| w.id), Some(12));
    }

    #[test]
    fn test_grow_keeps_order() {
        let now = Instant::now();
        let mut queue = WorkerLoopQueue::new(2);
        queue.insert(Dummy { id: 0, at: now }).unwrap();
        queue.insert(Dummy { id: 1, at: now }).unwrap();

        queue.grow(4);
        assert_eq!(queue.capacity(), 4);
        queue.insert(Dummy { id: 2, at: now }).unwrap();

        let order: Vec<u32> = std::iter::from_fn(|| queue.detach()).map(|w| w.id).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_reset_releases() {
        let now = Instant::now();
        let mut queue = WorkerLoopQueue::new(1);
        queue.insert(Dummy { id: 0, at: now }).unwrap();

        assert_eq!(queue.reset().len(), 1);
        assert_eq!(queue.insert(Dummy { id: 1, at: now }), Err(PoolError::QueueIsReleased));
    }
}
