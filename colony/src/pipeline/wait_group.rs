//! Wait groups for the helper tasks of a pipeline.
//!
//! [`ManifoldFuncPool::source`](super::ManifoldFuncPool::source) and
//! [`start_cancellation_monitor`](super::start_cancellation_monitor) spawn
//! their tasks on a [`WaitGroup`] so that the owner can wait for them. A plain
//! `TaskTracker` does the job; [`TrackableWaitGroup`] adds a live count and
//! hooks fired on every add and done.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::task::TaskTracker;
use tracing::trace;

/// A group of spawned tasks that can be waited for as a whole.
pub trait WaitGroup {
    /// Spawns `task` as a member of the group.
    fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

impl WaitGroup for TaskTracker {
    fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(task);
    }
}

/// Called with the number of live tasks after it changed.
pub type CountHook = Arc<dyn Fn(usize) + Send + Sync>;

/// # Trackable Wait Group
///
/// A `TaskTracker` that counts its live tasks and reports every change.
///
/// `on_add` runs on the spawning side before the task starts; `on_done` runs
/// when the task finishes, panics or is aborted. Both receive the count after
/// the change.
#[derive(Clone)]
pub struct TrackableWaitGroup {
    tracker: TaskTracker,
    count: Arc<AtomicUsize>,
    on_add: CountHook,
    on_done: CountHook,
}

impl TrackableWaitGroup {
    pub fn new<A, D>(on_add: A, on_done: D) -> Self
    where
        A: Fn(usize) + Send + Sync + 'static,
        D: Fn(usize) + Send + Sync + 'static,
    {
        Self {
            tracker: TaskTracker::new(),
            count: Arc::new(AtomicUsize::new(0)),
            on_add: Arc::new(on_add),
            on_done: Arc::new(on_done),
        }
    }

    /// A group reporting adds and dones as `trace` events tagged `name`.
    pub fn traced(name: &'static str) -> Self {
        Self::new(
            move |count| trace!(group = name, count, "task added"),
            move |count| trace!(group = name, count, "task done"),
        )
    }

    /// Tasks spawned and not yet finished.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Lets `wait` return once the group drains. Returns `false` if already
    /// closed.
    pub fn close(&self) -> bool {
        self.tracker.close()
    }

    /// Waits until the group is closed and every task has finished.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}

impl WaitGroup for TrackableWaitGroup {
    fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        (self.on_add)(count);

        let done = DoneGuard {
            count: self.count.clone(),
            on_done: self.on_done.clone(),
        };
        self.tracker.spawn(async move {
            let _done = done;
            task.await;
        });
    }
}

impl fmt::Debug for TrackableWaitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackableWaitGroup")
            .field("count", &self.count())
            .field("closed", &self.tracker.is_closed())
            .finish()
    }
}

struct DoneGuard {
    count: Arc<AtomicUsize>,
    on_done: CountHook,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let count = self.count.fetch_sub(1, Ordering::AcqRel) - 1;
        (self.on_done)(count);
    }
}
