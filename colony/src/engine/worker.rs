use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Instant;

use colony_api::WorkerId;
use flume::{Receiver, Sender};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, trace};

use super::pool::PoolInner;
use super::queue::IdleWorker;

/// Capacity of a worker's private input channel.
pub(crate) const WORKER_CHAN_CAP: usize = 1;

/// The function a pool runs for every payload, boxed once at construction.
pub type PoolFunc<P> = Arc<dyn Fn(WorkerId, P) -> BoxFuture<'static, ()> + Send + Sync>;

/// Message on a worker's input channel.
pub(crate) enum Command<P> {
    /// Execute `payload`. The handle travels with the job so that exactly
    /// one owner exists while the worker is busy.
    Run { payload: P, handle: WorkerHandle<P> },

    /// Exit the loop.
    Finish,
}

/// # Worker Handle
///
/// The pool-side half of a worker: the only sender of its input channel plus
/// the last-use stamp read by the purge scavenger.
///
/// ## Ownership
/// - idle: parked in the pool's worker queue
/// - busy: moved into the worker task together with the job
/// - finished: dropped, which disconnects the channel and ends the task
pub(crate) struct WorkerHandle<P> {
    id: WorkerId,
    tx: Sender<Command<P>>,
    last_used: Instant,
}

impl<P> WorkerHandle<P> {
    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_used = now;
    }

    /// Hands `payload` to the worker. Gives the payload back if the worker
    /// is gone.
    pub(crate) fn run(self, payload: P) -> Result<(), P> {
        let tx = self.tx.clone();
        match tx.try_send(Command::Run { payload, handle: self }) {
            Ok(()) => Ok(()),
            Err(err) => match err.into_inner() {
                Command::Run { payload, .. } => Err(payload),
                Command::Finish => Ok(()),
            },
        }
    }

    /// Asks the worker to exit.
    pub(crate) fn finish(self) {
        let _ = self.tx.try_send(Command::Finish);
    }
}

impl<P> IdleWorker for WorkerHandle<P> {
    fn last_used(&self) -> Instant {
        self.last_used
    }
}

impl<P> fmt::Debug for WorkerHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("last_used", &self.last_used)
            .finish()
    }
}

/// # Worker
///
/// An independent tokio task executing one payload at a time.
///
/// ## Core Algorithm
/// 1. Await the private input channel
/// 2. On `Run`, execute the pool function with panics caught
/// 3. Revert to the pool's idle queue; exit if the pool refuses
/// 4. On `Finish` or a disconnected channel, exit
///
/// On exit the running count drops, the id returns to the free list and one
/// waiting caller is woken.
pub(crate) struct Worker<P> {
    id: WorkerId,
    pool: Weak<PoolInner<P>>,
    rx: Receiver<Command<P>>,
}

impl<P: Send + 'static> Worker<P> {
    /// Spawns the worker task and returns its handle. The caller has already
    /// counted the worker as running.
    pub(crate) fn spawn(pool: &Arc<PoolInner<P>>, id: WorkerId) -> WorkerHandle<P> {
        let (tx, rx) = flume::bounded(WORKER_CHAN_CAP);
        let worker = Worker {
            id,
            pool: Arc::downgrade(pool),
            rx,
        };
        tokio::spawn(worker.run_loop());

        WorkerHandle {
            id,
            tx,
            last_used: pool.now(),
        }
    }

    async fn run_loop(self) {
        trace!(worker = %self.id, "worker started");

        while let Ok(Command::Run { payload, handle }) = self.rx.recv_async().await {
            let Some(pool) = self.pool.upgrade() else {
                break;
            };

            let task = (pool.func())(self.id, payload);
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                pool.report_panic(self.id, panic);
                break;
            }

            if !pool.revert_worker(handle) {
                break;
            }
        }

        trace!(worker = %self.id, "worker exiting");
        if let Some(pool) = self.pool.upgrade() {
            pool.worker_exited(self.id);
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(err) = panic.downcast_ref::<colony_api::PoolError>() {
        err.to_string()
    } else {
        debug!("panic payload of unknown type");
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_handle_run_returns_payload_when_worker_gone() {
        let (tx, rx) = flume::bounded(WORKER_CHAN_CAP);
        drop(rx);
        let handle = WorkerHandle::<u32> {
            id: WorkerId(1),
            tx,
            last_used: Instant::now(),
        };

        assert_eq!(handle.run(7), Err(7));
    }
}
