use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use colony_api::{PoolError, WorkerId};
use crossbeam_queue::SegQueue;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, trace};

use super::options::{Options, UNBOUNDED};
use super::queue::{QueueKind, WorkerQueue, new_worker_queue};
use super::scavenger::{CachedClock, Scavengers, spawn_purge, spawn_ticktock};
use super::worker::{PoolFunc, Worker, WorkerHandle, panic_message};

/// Polling period of [`WorkerPool::release_timeout`].
pub const RELEASE_TIMEOUT_INTERVAL: Duration = Duration::from_millis(10);

type IdleQueue<P> = Box<dyn WorkerQueue<WorkerHandle<P>>>;

/// # Worker Pool
///
/// A bounded set of reusable workers running one function over submitted
/// payloads.
///
/// ## Key Responsibilities
/// - Admission: reuse an idle worker, spawn one while below capacity, or
///   make the caller wait (or fail when non-blocking)
/// - Recycling: finished workers return to an idle queue and are reused
/// - Eviction: the purge scavenger finishes workers idle past the expiry
/// - Lifecycle: `release` closes the pool, `reboot` reopens it
///
/// ## Implementation Details
/// Shared state lives in [`PoolInner`]; the handle is cheap to clone. The
/// idle queue is guarded by a `std::sync::Mutex` that is never held across an
/// `.await`. Waiting callers park on a `Notify`, registering interest while
/// still holding the lock so a revert between unlock and sleep cannot be
/// missed; every wake-up re-checks the pool state from the top.
///
/// Pools spawn tokio tasks and must be created inside a runtime.
pub struct WorkerPool<P: Send + 'static> {
    inner: Arc<PoolInner<P>>,
}

impl<P: Send + 'static> Clone for WorkerPool<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Send + 'static> fmt::Debug for WorkerPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("cap", &self.cap())
            .field("running", &self.running())
            .field("waiting", &self.waiting())
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub(crate) struct PoolInner<P> {
    /// Worker capacity, [`UNBOUNDED`] for no limit
    capacity: AtomicI32,

    /// Live workers, idle or busy
    running: AtomicUsize,

    /// Callers parked in `retrieve_worker`
    waiting: AtomicUsize,

    closed: AtomicBool,

    idle: Mutex<IdleQueue<P>>,

    cond: Notify,

    clock: CachedClock,

    /// Ids of exited workers, reused before new ones are minted
    free_ids: SegQueue<WorkerId>,

    next_id: AtomicU32,

    func: PoolFunc<P>,

    options: Options,

    queue_kind: QueueKind,

    token: CancellationToken,

    scavengers: Mutex<Scavengers>,
}

impl<P> Drop for PoolInner<P> {
    fn drop(&mut self) {
        self.scavengers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }
}

/// Decrements the waiting count when a parked caller wakes or is dropped.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(waiting: &'a AtomicUsize) -> Self {
        waiting.fetch_add(1, Ordering::AcqRel);
        Self(waiting)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<P: Send + 'static> WorkerPool<P> {
    /// Creates a pool running `func` for every invoked payload.
    pub fn new<F, Fut>(func: F, options: Options) -> Result<Self, PoolError>
    where
        F: Fn(WorkerId, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with_token(CancellationToken::new(), func, options)
    }

    /// Like [`WorkerPool::new`] with a governing token; cancelling it stops
    /// the scavengers.
    pub fn with_token<F, Fut>(token: CancellationToken, func: F, options: Options) -> Result<Self, PoolError>
    where
        F: Fn(WorkerId, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let func: PoolFunc<P> = Arc::new(move |id, payload| func(id, payload).boxed());
        Self::from_parts(token, Some(func), options)
    }

    /// Builds a pool from an already boxed function. Fails with
    /// `LackPoolFunc` when `func` is absent.
    pub fn from_parts(token: CancellationToken, func: Option<PoolFunc<P>>, options: Options) -> Result<Self, PoolError> {
        let func = func.ok_or(PoolError::LackPoolFunc)?;
        let options = options.resolve()?;

        let (queue_kind, queue_size) = if options.pre_alloc {
            (QueueKind::LoopQueue, options.size as usize)
        } else {
            (QueueKind::Stack, 0)
        };

        let inner = Arc::new(PoolInner {
            capacity: AtomicI32::new(options.size),
            running: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            idle: Mutex::new(new_worker_queue(queue_kind, queue_size)),
            cond: Notify::new(),
            clock: CachedClock::new(),
            free_ids: SegQueue::new(),
            next_id: AtomicU32::new(0),
            func,
            options,
            queue_kind,
            token,
            scavengers: Mutex::new(Scavengers::default()),
        });

        if inner.options.pre_alloc {
            inner.prealloc(queue_size);
        }
        inner.start_scavengers();

        debug!(
            size = inner.options.size,
            pre_alloc = inner.options.pre_alloc,
            nonblocking = inner.options.nonblocking,
            "worker pool created"
        );

        Ok(Self { inner })
    }

    /// Runs `payload` on a worker.
    ///
    /// Waits for a free worker when the pool is saturated unless it is
    /// non-blocking or the waiting limit is reached, in which case
    /// `PoolOverload` is returned. Dropping the future abandons the wait.
    pub async fn invoke(&self, payload: P) -> Result<(), PoolError> {
        if self.inner.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let mut payload = payload;
        loop {
            let worker = self.inner.retrieve_worker().await?;
            match worker.run(payload) {
                Ok(()) => return Ok(()),
                // the worker died after parking; try another
                Err(returned) => payload = returned,
            }
        }
    }

    /// Closes the pool: stops the scavengers, finishes idle workers and wakes
    /// every waiting caller. Jobs in flight complete; their workers exit on
    /// revert.
    pub fn release(&self) {
        self.inner.release();
    }

    /// Releases the pool and waits until every worker and scavenger has
    /// stopped. Fails with `PoolClosed` if the pool was not open and with
    /// `Timeout` if `timeout` elapses first.
    pub async fn release_timeout(&self, timeout: Duration) -> Result<(), PoolError> {
        if self.inner.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        self.inner.release();

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let scavengers_done = self.inner.scavengers().all_done();
            if self.running() == 0 && scavengers_done {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PoolError::Timeout);
            }
            tokio::time::sleep(RELEASE_TIMEOUT_INTERVAL).await;
        }
    }

    /// Reopens a released pool with a fresh idle queue and restarts the
    /// scavengers. No effect on an open pool.
    pub async fn reboot(&self) {
        if self
            .inner
            .closed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        *self.inner.lock_idle() = new_worker_queue(self.inner.queue_kind, self.inner.queue_capacity());

        let previous = std::mem::take(&mut *self.inner.scavengers());
        if let Some(purge) = previous.purge {
            purge.join().await;
        }
        if let Some(ticktock) = previous.ticktock {
            ticktock.join().await;
        }

        self.inner.start_scavengers();
        debug!("worker pool rebooted");
    }

    /// Changes the capacity. Waiters are woken when it grows; a smaller
    /// capacity takes effect as surplus workers finish their jobs.
    /// Unbounded pools and non-positive sizes are ignored.
    pub fn tune(&self, size: i32) {
        let capacity = self.cap();
        if capacity == UNBOUNDED || size <= 0 || size == capacity {
            return;
        }

        if self.inner.options.pre_alloc {
            self.inner.lock_idle().grow(size as usize);
        }
        self.inner.capacity.store(size, Ordering::Release);

        if size > capacity {
            if size - capacity == 1 {
                self.inner.cond.notify_one();
            } else {
                self.inner.cond.notify_waiters();
            }
        }
        debug!(from = capacity, to = size, "worker pool tuned");
    }

    /// Live workers, idle or busy.
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Callers currently blocked waiting for a worker.
    pub fn waiting(&self) -> usize {
        self.inner.waiting()
    }

    /// Workers that could still be started, `-1` when unbounded.
    pub fn free(&self) -> i32 {
        let capacity = self.cap();
        if capacity < 0 {
            return UNBOUNDED;
        }
        capacity - i32::try_from(self.running()).unwrap_or(i32::MAX)
    }

    pub fn cap(&self) -> i32 {
        self.inner.capacity.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// The resolved configuration.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// The token governing this pool's background tasks.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }
}

impl<P: Send + 'static> PoolInner<P> {
    pub(crate) fn func(&self) -> &PoolFunc<P> {
        &self.func
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    pub(crate) fn tick(&self) {
        self.clock.tick();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    pub(crate) fn broadcast(&self) {
        self.cond.notify_waiters();
    }

    fn lock_idle(&self) -> MutexGuard<'_, IdleQueue<P>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scavengers(&self) -> MutexGuard<'_, Scavengers> {
        self.scavengers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue_capacity(&self) -> usize {
        match self.queue_kind {
            QueueKind::LoopQueue => self.capacity.load(Ordering::Acquire).max(1) as usize,
            QueueKind::Stack => 0,
        }
    }

    fn has_capacity(&self) -> bool {
        let capacity = self.capacity.load(Ordering::Acquire);
        capacity == UNBOUNDED || (capacity > 0 && self.running.load(Ordering::Acquire) < capacity as usize)
    }

    fn allocate_id(&self) -> WorkerId {
        self.free_ids
            .pop()
            .unwrap_or_else(|| WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn start_scavengers(self: &Arc<Self>) {
        let mut scavengers = self.scavengers();
        if !self.options.disable_purge {
            scavengers.purge = Some(spawn_purge(self, &self.token, self.options.expiry_duration));
        }
        scavengers.ticktock = Some(spawn_ticktock(self, &self.token));
    }

    fn prealloc(self: &Arc<Self>, size: usize) {
        let mut idle = self.lock_idle();
        for _ in 0..size {
            let id = self.allocate_id();
            self.running.fetch_add(1, Ordering::AcqRel);
            let worker = Worker::spawn(self, id);
            if idle.insert(worker).is_err() {
                break;
            }
        }
    }

    /// Hands out an idle worker or spawns a new one, waiting for a revert
    /// when the pool is saturated.
    async fn retrieve_worker(self: &Arc<Self>) -> Result<WorkerHandle<P>, PoolError> {
        loop {
            let notified = self.cond.notified();
            tokio::pin!(notified);

            let _waiting = {
                let mut idle = self.lock_idle();
                if self.is_closed() {
                    return Err(PoolError::PoolClosed);
                }

                if let Some(worker) = idle.detach() {
                    return Ok(worker);
                }

                if self.has_capacity() {
                    let id = self.allocate_id();
                    self.running.fetch_add(1, Ordering::AcqRel);
                    drop(idle);
                    return Ok(Worker::spawn(self, id));
                }

                let max_blocking = self.options.max_blocking_tasks;
                if self.options.nonblocking || (max_blocking != 0 && self.waiting() >= max_blocking) {
                    return Err(PoolError::PoolOverload);
                }

                notified.as_mut().enable();
                WaitingGuard::enter(&self.waiting)
            };

            trace!("waiting for an idle worker");
            notified.await;
        }
    }

    /// Parks a worker that finished its job. Returns `false` when the worker
    /// must exit instead.
    pub(crate) fn revert_worker(&self, mut worker: WorkerHandle<P>) -> bool {
        let capacity = self.capacity.load(Ordering::Acquire);
        let over = capacity > 0 && self.running.load(Ordering::Acquire) > capacity as usize;
        if over || self.is_closed() {
            self.cond.notify_waiters();
            return false;
        }

        worker.touch(self.clock.now());

        let mut idle = self.lock_idle();
        // the pool may have closed while we were unlocked
        if self.is_closed() {
            self.cond.notify_waiters();
            return false;
        }
        let id = worker.id();
        if let Err(err) = idle.insert(worker) {
            trace!(worker = %id, error = %err, "worker rejected by idle queue");
            return false;
        }
        self.cond.notify_one();
        true
    }

    pub(crate) fn worker_exited(&self, id: WorkerId) {
        let _idle = self.lock_idle();
        self.running.fetch_sub(1, Ordering::AcqRel);
        self.free_ids.push(id);
        self.cond.notify_one();
    }

    /// Removes expired workers. Also reports whether no worker will be left
    /// once they are finished.
    pub(crate) fn collect_stale(&self, expiry: Duration) -> (Vec<WorkerHandle<P>>, bool) {
        let mut idle = self.lock_idle();
        let stale = idle.refresh(Instant::now(), expiry);
        let running = self.running.load(Ordering::Acquire);
        let dormant = running == 0 || running == stale.len();
        (stale, dormant)
    }

    pub(crate) fn report_panic(&self, id: WorkerId, panic: Box<dyn Any + Send>) {
        match &self.options.panic_handler {
            Some(handler) => handler(panic),
            None => {
                let message = format!("{id} exits from panic: {}", panic_message(panic.as_ref()));
                self.options.logger().log(Level::ERROR, &message);
            }
        }
    }

    fn release(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.scavengers().stop();

        let idle = self.lock_idle().reset();
        debug!(idle = idle.len(), "worker pool released");
        for worker in idle {
            worker.finish();
        }

        // wake everyone blocked in retrieve_worker so they observe the close
        self.cond.notify_waiters();
    }
}
