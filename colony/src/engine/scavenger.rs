//! Background maintenance tasks of a pool.
//!
//! - the purge scavenger evicts workers idle longer than the expiry duration
//! - the clock scavenger (`ticktock`) refreshes the cached "now" read on
//!   every worker revert
//!
//! Each runs until its token is cancelled or the pool closes, then raises its
//! done flag. Both hold the pool weakly so that dropping every pool handle
//! also ends them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::pool::PoolInner;

/// Refresh period of the cached clock.
pub const NOW_TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// A coarse clock read without a syscall.
#[derive(Debug)]
pub(crate) struct CachedClock {
    epoch: Instant,
    nanos: AtomicU64,
}

impl CachedClock {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            nanos: AtomicU64::new(0),
        }
    }

    pub(crate) fn now(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    pub(crate) fn tick(&self) {
        let elapsed = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.nanos.store(elapsed, Ordering::Relaxed);
    }
}

/// A running scavenger task.
#[derive(Debug)]
pub(crate) struct Scavenger {
    token: CancellationToken,
    done: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl Scavenger {
    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn stop(&self) {
        self.token.cancel();
    }

    /// Cancels the task and waits for it to finish.
    pub(crate) async fn join(self) {
        self.token.cancel();
        if let Err(err) = self.join.await {
            debug!(error = %err, "scavenger task ended abnormally");
        }
    }
}

/// The pool's pair of scavengers. `purge` is absent when purging is disabled.
#[derive(Debug, Default)]
pub(crate) struct Scavengers {
    pub(crate) purge: Option<Scavenger>,
    pub(crate) ticktock: Option<Scavenger>,
}

impl Scavengers {
    pub(crate) fn stop(&self) {
        if let Some(purge) = &self.purge {
            purge.stop();
        }
        if let Some(ticktock) = &self.ticktock {
            ticktock.stop();
        }
    }

    /// Whether every scavenger that was started has finished.
    pub(crate) fn all_done(&self) -> bool {
        self.purge.as_ref().is_none_or(Scavenger::is_done)
            && self.ticktock.as_ref().is_none_or(Scavenger::is_done)
    }
}

pub(crate) fn spawn_purge<P: Send + 'static>(
    pool: &Arc<PoolInner<P>>,
    parent: &CancellationToken,
    expiry: Duration,
) -> Scavenger {
    let token = parent.child_token();
    let done = Arc::new(AtomicBool::new(false));
    let join = tokio::spawn(purge_stale_workers(
        Arc::downgrade(pool),
        token.clone(),
        done.clone(),
        expiry,
    ));
    Scavenger { token, done, join }
}

pub(crate) fn spawn_ticktock<P: Send + 'static>(
    pool: &Arc<PoolInner<P>>,
    parent: &CancellationToken,
) -> Scavenger {
    let token = parent.child_token();
    let done = Arc::new(AtomicBool::new(false));
    let join = tokio::spawn(ticktock(Arc::downgrade(pool), token.clone(), done.clone()));
    Scavenger { token, done, join }
}

async fn purge_stale_workers<P: Send + 'static>(
    pool: Weak<PoolInner<P>>,
    token: CancellationToken,
    done: Arc<AtomicBool>,
    expiry: Duration,
) {
    let mut ticker = time::interval_at(time::Instant::now() + expiry, expiry);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(pool) = pool.upgrade() else {
            break;
        };
        if pool.is_closed() {
            break;
        }

        let (stale, dormant) = pool.collect_stale(expiry);
        if !stale.is_empty() {
            debug!(count = stale.len(), "purging idle workers");
        }
        for worker in stale {
            worker.finish();
        }

        // every worker may be gone while callers still wait for one
        if dormant && pool.waiting() > 0 {
            pool.broadcast();
        }
    }

    trace!("purge scavenger stopped");
    done.store(true, Ordering::Release);
}

async fn ticktock<P: Send + 'static>(pool: Weak<PoolInner<P>>, token: CancellationToken, done: Arc<AtomicBool>) {
    let mut ticker = time::interval(NOW_TIME_UPDATE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(pool) = pool.upgrade() else {
            break;
        };
        if pool.is_closed() {
            break;
        }
        pool.tick();
    }

    trace!("clock scavenger stopped");
    done.store(true, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_clock_only_moves_on_tick() {
        let clock = CachedClock::new();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), first);

        clock.tick();
        assert!(clock.now() >= first + Duration::from_millis(5));
    }
}
