use std::time::{Duration, Instant};

use colony_api::PoolError;

use super::{IdleWorker, WorkerQueue, expiry_threshold};

/// LIFO queue of idle workers.
///
/// Workers are pushed in return order so the vector stays sorted by
/// last-use time, oldest at index 0.
#[derive(Debug)]
pub struct WorkerStack<W> {
    items: Vec<W>,
    released: bool,
}

impl<W> WorkerStack<W> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            released: false,
        }
    }
}

impl<W> Default for WorkerStack<W> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<W: IdleWorker + Send> WorkerQueue<W> for WorkerStack<W> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn insert(&mut self, worker: W) -> Result<(), PoolError> {
        if self.released {
            return Err(PoolError::QueueIsReleased);
        }
        self.items.push(worker);
        Ok(())
    }

    fn detach(&mut self) -> Option<W> {
        self.items.pop()
    }

    fn refresh(&mut self, now: Instant, expiry: Duration) -> Vec<W> {
        let Some(threshold) = expiry_threshold(now, expiry) else {
            return Vec::new();
        };
        let expired = self.items.partition_point(|w| w.last_used() <= threshold);
        self.items.drain(..expired).collect()
    }

    fn reset(&mut self) -> Vec<W> {
        self.released = true;
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Dummy;
    use super::*;

    fn ids(workers: &[Dummy]) -> Vec<u32> {
        workers.iter().map(|w| w.id).collect()
    }

    #[test]
    fn test_lifo_order() {
        let now = Instant::now();
        let mut stack = WorkerStack::default();
        assert!(stack.is_empty());
        assert!(stack.detach().is_none());

        for id in 0..3 {
            stack.insert(Dummy { id, at: now }).unwrap();
        }

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.detach().map(|w| w.id), Some(2));
        assert_eq!(stack.detach().map(|w| w.id), Some(1));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_refresh_cuts_expired_prefix() {
        let base = Instant::now();
        let mut stack = WorkerStack::default();
        for id in 0..5u32 {
            let at = base + Duration::from_secs(u64::from(id));
            stack.insert(Dummy { id, at }).unwrap();
        }

        // idle for >= 2s at base+3s: workers 0 and 1
        let expired = stack.refresh(base + Duration::from_secs(3), Duration::from_secs(2));
        assert_eq!(ids(&expired), vec![0, 1]);
        assert_eq!(stack.len(), 3);

        let none = stack.refresh(base + Duration::from_secs(3), Duration::from_secs(10));
        assert!(none.is_empty());
        assert_eq!(stack.len(), 3);

        let all = stack.refresh(base + Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(ids(&all), vec![2, 3, 4]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_reset_releases() {
        let now = Instant::now();
        let mut stack = WorkerStack::default();
        stack.insert(Dummy { id: 1, at: now }).unwrap();

        assert_eq!(stack.reset().len(), 1);
        assert!(stack.is_empty());
        assert_eq!(stack.insert(Dummy { id: 2, at: now }), Err(PoolError::QueueIsReleased));
    }
}
